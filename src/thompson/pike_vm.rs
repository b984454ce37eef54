//! Parallel Pike-style NFA VM (§4.C10) — the execution core.
//!
//! All live threads advance exactly one input byte per step. A single
//! "seen" bitmap per step (here: two, one for each of the two work queues,
//! per §3's `Run state`) bounds total work per byte to `O(|insns|)`: once a
//! pc has been claimed this step, every other thread that reaches it dies
//! (`aem_nfa_run`'s `char *seen` bitmap, generalized to a real bitset).
//!
//! Longest match wins: once a thread fires `MATCH`, its captures and
//! visited bitmap become the current best candidate, but other still-live
//! threads keep running — a match found at a later byte position always
//! displaces an earlier, shorter one, and among matches found within the
//! same step the most-recently-processed thread wins (§4.C10 "Match
//! semantics" — the source's own wording, kept verbatim rather than
//! "fixed" into POSIX leftmost-longest; see §9 Open Questions and
//! `DESIGN.md`).

use crate::thompson::error::VmError;
use crate::thompson::insn::{CClass, Insn};
use crate::thompson::optimize;
use crate::thompson::program::{Bitset, Program};
use crate::util::Span;

/// The winning thread of a run: which pattern matched, where it ended, its
/// capture spans, and every pc it executed (the last is handed to
/// [`crate::thompson::disas::disassemble`] to render a trace).
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub pattern_id: i32,
    /// Byte offset one past the last consumed byte — the cursor position
    /// a caller should advance to (§6 "Run against input").
    pub end: usize,
    pub captures: Box<[Span]>,
    pub visited: Bitset,
}

#[derive(Clone)]
struct Thread {
    captures: Box<[Span]>,
    visited: Bitset,
}

impl Thread {
    fn new(n_captures: usize, n_insns: usize) -> Self {
        Self {
            captures: vec![Span::invalid(); n_captures].into_boxed_slice(),
            visited: Bitset::new(n_insns),
        }
    }

    fn set_capture(&mut self, end: bool, index: usize, pos: usize) -> Result<(), VmError> {
        match self.captures.get_mut(index) {
            Some(span) if end => {
                span.to = pos;
                Ok(())
            }
            Some(span) => {
                span.from = pos;
                Ok(())
            }
            None => {
                log::error!("capture index {index} out of range ({} groups)", self.captures.len());
                Err(VmError::CaptureOutOfRange(index))
            }
        }
    }
}

/// The two-sided membership test behind `^`/`$`/`\<`/`\>`/`\A`/`\z`: a
/// frontier fires on an *entering* transition (`neg = false`: not a member
/// just before the current position, a member at it — e.g. `^`, `\<`,
/// `\A`) or a *leaving* transition (`neg = true`: a member just before, not
/// a member now — e.g. `$`, `\>`, `\z`). Both sides test plain
/// (non-negated) class membership; `neg` only selects the direction.
///
/// This is this implementation's resolution of §4.C10's slightly informal
/// prose ("require that the previous byte did not match, or no previous
/// byte exists"): a symmetric entering/leaving pair, recorded as a
/// deliberate choice in `DESIGN.md` rather than guessed silently.
fn frontier_fires(class: CClass, neg: bool, prev: Option<u8>, cur: Option<u8>) -> bool {
    let member = |b: Option<u8>| b.is_some_and(|b| class.matches(b));
    if neg {
        member(prev) && !member(cur)
    } else {
        !member(prev) && member(cur)
    }
}

/// Expands the epsilon-closure starting at `pc`, recursively following
/// `JMP`, both edges of `FORK` (parent-continues-at-`pc+1` explored before
/// the spawned sibling, giving Pike's leftmost-first priority), `CAPTURE`,
/// and satisfied frontier `CLASS`es. Stops at a consuming instruction
/// (queued into `queue` for the next step) or at `MATCH` (recorded into
/// `best`).
#[allow(clippy::too_many_arguments)]
fn add_thread(
    program: &Program,
    queue: &mut Vec<(usize, Thread)>,
    map: &mut Bitset,
    pc: usize,
    mut thread: Thread,
    pos: usize,
    prev_byte: Option<u8>,
    cur_byte: Option<u8>,
    best: &mut Option<RunOutput>,
) -> Result<(), VmError> {
    if pc >= program.len() {
        return Err(VmError::PcOutOfRange(pc));
    }
    if map.set(pc) {
        // Duplicate thread for this step — the dedup invariant that bounds
        // total work to O(|insns|) per byte (§5).
        return Ok(());
    }
    thread.visited.set(pc);
    match program.get(pc).decode() {
        Insn::Jmp { target } => add_thread(program, queue, map, target as usize, thread, pos, prev_byte, cur_byte, best),
        Insn::Fork { target } => {
            add_thread(program, queue, map, pc + 1, thread.clone(), pos, prev_byte, cur_byte, best)?;
            add_thread(program, queue, map, target as usize, thread, pos, prev_byte, cur_byte, best)
        }
        Insn::Capture { end, index } => {
            thread.set_capture(end, index as usize, pos)?;
            add_thread(program, queue, map, pc + 1, thread, pos, prev_byte, cur_byte, best)
        }
        Insn::Class { neg, frontier: true, class } => {
            if frontier_fires(class, neg, prev_byte, cur_byte) {
                add_thread(program, queue, map, pc + 1, thread, pos, prev_byte, cur_byte, best)
            } else {
                Ok(())
            }
        }
        Insn::Match { tag } => {
            *best = Some(RunOutput { pattern_id: tag, end: pos, captures: thread.captures, visited: thread.visited });
            Ok(())
        }
        Insn::Range { .. } | Insn::Class { frontier: false, .. } => {
            queue.push((pc, thread));
            Ok(())
        }
    }
}

/// Runs `program` anchored at `input[start..]`: the match, if any, must
/// begin exactly at `start` (§6's "Run against input" is itself an
/// anchored-at-cursor primitive; unanchored scanning is built on top of it
/// in `regex.rs` by retrying at successive start positions).
///
/// Returns the winning thread's [`RunOutput`] on a match, `None` on no
/// match, or a [`VmError`] if the program violates its own invariants
/// (corrupt jump/fork targets) — distinct from "no match" so tests can
/// assert no bug ever fires on well-formed input (§7/§8 P-series).
pub fn run(program: &Program, input: &[u8], start: usize) -> Result<Option<RunOutput>, VmError> {
    let n_insns = program.len();
    let n_captures = program.n_captures() as usize;
    let mut map_curr = Bitset::new(n_insns);
    let mut map_next = Bitset::new(n_insns);
    let mut curr: Vec<(usize, Thread)> = Vec::new();
    let mut next: Vec<(usize, Thread)> = Vec::new();
    let mut best: Option<RunOutput> = None;
    let mut pos = start;
    // A run that resumes mid-subject (e.g. a later `find_all` scan) must see
    // the real byte before `start`, not treat `start` as the beginning of
    // the world — otherwise `^`/`\<`/`\A` would wrongly fire at every resume
    // point.
    let mut prev_byte: Option<u8> = if start > 0 { input.get(start - 1).copied() } else { None };

    let entries: Vec<usize> = match program.initial_pcs() {
        Some(pcs) => pcs.to_vec(),
        None => optimize::split_initial_forks(program),
    };

    let start_byte = input.get(pos).copied();
    for pc in entries {
        add_thread(program, &mut next, &mut map_next, pc, Thread::new(n_captures, n_insns), pos, prev_byte, start_byte, &mut best)?;
    }

    loop {
        std::mem::swap(&mut curr, &mut next);
        std::mem::swap(&mut map_curr, &mut map_next);
        next.clear();
        map_next.clear_all();
        if curr.is_empty() {
            break;
        }
        let cur_byte = input.get(pos).copied();
        for (pc, thread) in curr.drain(..) {
            match program.get(pc).decode() {
                Insn::Range { lo, hi } => {
                    if let Some(b) = cur_byte {
                        if b >= lo && b <= hi {
                            let next_byte = input.get(pos + 1).copied();
                            add_thread(program, &mut next, &mut map_next, pc + 1, thread, pos + 1, cur_byte, next_byte, &mut best)?;
                        }
                    }
                }
                Insn::Class { neg, frontier: false, class } => {
                    if let Some(b) = cur_byte {
                        if class.matches(b) ^ neg {
                            let next_byte = input.get(pos + 1).copied();
                            add_thread(program, &mut next, &mut map_next, pc + 1, thread, pos + 1, cur_byte, next_byte, &mut best)?;
                        }
                    }
                }
                other => {
                    log::error!("invalid opcode scheduled as a consuming instruction at pc {pc}: {other:?}");
                    return Err(VmError::InvalidOpcode(pc));
                }
            }
        }
        if cur_byte.is_none() {
            break;
        }
        prev_byte = cur_byte;
        pos += 1;
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thompson::compile::add_pattern;
    use crate::thompson::flags::Flags;
    use crate::thompson::parser::parse;

    fn compile(pattern: &str) -> Program {
        let (ast, _) = parse(pattern, Flags::NONE).unwrap();
        let mut program = Program::new();
        add_pattern(&mut program, &ast, 0).unwrap();
        optimize::optimize(&mut program);
        program
    }

    fn compile_many(patterns: &[(&str, i32)]) -> Program {
        let mut program = Program::new();
        for (pattern, tag) in patterns {
            let (ast, _) = parse(pattern, Flags::NONE).unwrap();
            add_pattern(&mut program, &ast, *tag).unwrap();
        }
        optimize::optimize(&mut program);
        program
    }

    #[test]
    fn literal_matches_full_input() {
        let program = compile("chicken soup");
        let out = run(&program, b"chicken soup", 0).unwrap().unwrap();
        assert_eq!(out.pattern_id, 0);
        assert_eq!(out.end, 12);
    }

    #[test]
    fn literal_rejects_mismatched_input() {
        let program = compile("chicken soup");
        assert!(run(&program, b"chicken souq", 0).unwrap().is_none());
    }

    #[test]
    fn dot_plus_consumes_up_to_longest_match_p2() {
        let program = compile(".+efg");
        let out = run(&program, b"abcdefg", 0).unwrap().unwrap();
        assert_eq!(out.end, 7);
    }

    #[test]
    fn greedy_plus_chain_leaves_trailing_byte_unconsumed() {
        // a+a+b on "aaaaaaaaaabZ": the two greedy a+ runs must still leave
        // exactly one 'b' for the final literal, consuming up to "aaaaaaaaaab".
        let program = compile("a+a+b");
        let out = run(&program, b"aaaaaaaaaabZ", 0).unwrap().unwrap();
        assert_eq!(out.end, 11);
    }

    #[test]
    fn bounded_bracket_repeat_consumes_whole_input() {
        let program = compile(r"[b\0a]([a-fP-Z]{6})");
        let out = run(&program, b" :eUf:VcQ", 0).unwrap().unwrap();
        assert_eq!(out.end, 9);
    }

    #[test]
    fn class_shortcuts_and_negated_named_class() {
        let program = compile(r"\w\W([[:^lower:]]|\d)+");
        let out = run(&program, b"abZ", 0).unwrap().unwrap();
        assert_eq!(out.end, 3);
    }

    #[test]
    fn posix_named_class_repetition() {
        let program = compile("bound[[:alnum:]]{6}");
        let out = run(&program, b"bound0Xcvbn", 0).unwrap().unwrap();
        assert_eq!(out.end, 11);
    }

    #[test]
    fn word_boundary_pattern_wins_when_others_fail_to_match() {
        let program = compile_many(&[(r"\d+", 10), ("zzz", 11), (r"\<word\>", 12)]);
        let out = run(&program, b"word begin", 0).unwrap().unwrap();
        assert_eq!(out.pattern_id, 12);
        assert_eq!(out.end, 4);
    }

    #[test]
    fn capture_group_spans_are_populated() {
        let (ast, n_captures) = parse("(chicken soup)", Flags::NONE).unwrap();
        let mut program = Program::new();
        add_pattern(&mut program, &ast, 2).unwrap();
        program.set_n_captures(n_captures);
        optimize::optimize(&mut program);
        let out = run(&program, b"chicken soup", 0).unwrap().unwrap();
        assert_eq!(out.pattern_id, 2);
        let span = out.captures[0];
        assert_eq!((span.from, span.to), (0, 12));
    }

    #[test]
    fn caret_fires_only_at_start_of_line() {
        let program = compile("^foo");
        assert!(run(&program, b"foo", 0).unwrap().is_some());
        assert!(run(&program, b"xfoo", 1).unwrap().is_none());
        assert!(run(&program, b"\nfoo", 1).unwrap().is_some());
    }

    #[test]
    fn dollar_fires_only_at_end_of_line() {
        let program = compile("foo$");
        assert!(run(&program, b"foo", 0).unwrap().is_some());
        assert!(run(&program, b"foo\n", 0).unwrap().is_some());
        assert!(run(&program, b"food", 0).unwrap().is_none());
    }

    #[test]
    fn dollar_tests_the_byte_just_consumed_not_a_stale_resume_byte() {
        // Regression: add_thread's consuming-instruction continuation used to
        // be called with the outer loop's not-yet-updated `prev_byte` (the
        // byte at pos-1) instead of the byte just consumed (`cur_byte`, at
        // pos). Anchored at start=1 on b"\x01a", the frontier test for `$`
        // must see the just-consumed 'a' (a `Line` member) as its "previous"
        // byte, not the stale 0x01 before it.
        let program = compile("a$");
        let out = run(&program, b"\x01a", 1).unwrap().unwrap();
        assert_eq!(out.end, 2);
    }

    #[test]
    fn thread_visited_bitmap_is_nonempty_on_match() {
        let program = compile("ab");
        let out = run(&program, b"ab", 0).unwrap().unwrap();
        assert!(out.visited.count_ones() >= 2);
    }

    #[test]
    fn no_match_leaves_no_bug() {
        let program = compile("xyz");
        let result = run(&program, b"abc", 0).unwrap();
        assert!(result.is_none());
    }
}
