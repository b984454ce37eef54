//! Types and API for Regex matching (§6 "External Interfaces").
//!
//! [`Builder`] assembles one or more patterns into a shared
//! [`crate::thompson::program::Program`] (§4.C2), optimizes it (§4.C8), and
//! hands back an immutable [`Regex`]. `Regex` itself stays close to the
//! original single-engine API — `is_match`/`find`/`find_captures`/
//! `find_all`/`find_all_captures` — generalized to report which of possibly
//! several registered patterns matched via [`crate::util::Match::pattern_id`].
//!
//! There used to be a second, JIT-compiled engine here. It's gone: this
//! crate's grammar (POSIX classes, `d`/`c`/`b` flags, frontier escapes) has
//! no JIT backend, only the interpreter in [`crate::thompson::pike_vm`].

use crate::thompson::error::CompileError;
use crate::thompson::flags::Flags;
use crate::thompson::program::Program;
use crate::thompson::{compile, disas, optimize, parser};
use crate::thompson::pike_vm::{self, RunOutput};
use crate::util::{Captures, Input, Match};

/// Builds a [`Program`] one pattern at a time, then optimizes and freezes it
/// into a [`Regex`] (`aem_nfa_add` called in a loop, followed by the
/// compiler's optimization pass, per §6 "Add pattern").
pub struct Builder {
    program: Program,
    next_id: i32,
    sandbox: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self { program: Program::with_debug_info(), next_id: 0, sandbox: false }
    }

    /// A builder that rejects flags unsafe to expose to untrusted pattern
    /// text (§4.C4's sandbox-safety column).
    pub fn sandboxed() -> Self {
        Self { program: Program::with_debug_info(), next_id: 0, sandbox: true }
    }

    /// Parses and compiles `pattern` under the given flag letters (§4.C4/C5),
    /// atomically: a failure here leaves the builder exactly as it was
    /// (`compile::add_pattern`'s checkpoint/rollback, P1).
    ///
    /// `match_id` picks the tag reported by [`crate::util::Match::pattern_id`]
    /// on a hit; `None` auto-assigns the next unused id starting at 0.
    /// Returns the id actually used.
    pub fn add_pattern(
        &mut self,
        pattern: &str,
        match_id: Option<i32>,
        flag_text: &str,
    ) -> Result<i32, CompileError> {
        let (flags, consumed) = Flags::adj(flag_text, Flags::BINARY, self.sandbox);
        if consumed != flag_text.len() {
            let garbage = flag_text[consumed..].to_string();
            return Err(CompileError::from(crate::thompson::error::ParseError::GarbageAfterFlags(garbage)));
        }
        let (ast, _local_captures) = parser::parse(pattern, flags)?;
        if flags.contains(Flags::DEBUG) {
            log::debug!("parsed pattern {pattern:?} ({flag_text:?}): {}", ast.to_sexpr());
        }
        let id = self.reserve_id(match_id);
        compile::add_pattern(&mut self.program, &ast, id)?;
        Ok(id)
    }

    /// Compiles `text` as a literal string (§4.C6), bypassing the grammar
    /// entirely — every byte (or codepoint) is matched exactly, no
    /// metacharacter has special meaning.
    pub fn add_literal(&mut self, text: &str, match_id: Option<i32>) -> Result<i32, CompileError> {
        let ast = parser::compile_literal(text);
        let id = self.reserve_id(match_id);
        compile::add_pattern(&mut self.program, &ast, id)?;
        Ok(id)
    }

    fn reserve_id(&mut self, match_id: Option<i32>) -> i32 {
        match match_id {
            Some(id) => {
                self.next_id = self.next_id.max(id.saturating_add(1));
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        }
    }

    /// Runs the jump-threading/reachability optimizer (§4.C8) and freezes
    /// the result into a matchable [`Regex`].
    pub fn build(mut self) -> Regex {
        optimize::optimize(&mut self.program);
        Regex { program: self.program }
    }

    pub fn disassemble(&self) -> String {
        disas::disassemble(&self.program)
    }
}

/// A compiled, optimized program plus the matching operations over it (§6).
pub struct Regex {
    program: Program,
}

impl Regex {
    /// Compiles a single pattern with no flags, id 0 — the common case.
    /// For multiple patterns, per-pattern flags, or explicit ids, use
    /// [`Builder`].
    pub fn new(pattern: &str) -> Result<Self, CompileError> {
        let mut builder = Builder::new();
        builder.add_pattern(pattern, Some(0), "")?;
        Ok(builder.build())
    }

    /// Returns true whenever the input matches the regex or not, without
    /// returning the bounds of the match. This returns true iff find returns
    /// Some(...), but it may be faster in some cases.
    pub fn is_match<'s>(&self, input: impl Into<Input<'s>>) -> bool {
        self.find(input).is_some()
    }

    /// Match the regex against the input and returns the bounds of the match or
    /// None.
    pub fn find<'s>(&self, input: impl Into<Input<'s>>) -> Option<Match<'s>> {
        let input = input.into();
        let (start, out) = self.run_scan(&input)?;
        Some(Match::new(input.subject, out.pattern_id, start..out.end))
    }

    /// Returns an iterator over all non-overlapping match in the input.
    pub fn find_all<'r, 's>(&'r self, input: impl Into<Input<'s>>) -> AllMatch<'r, 's> {
        AllMatch { regex: self, input: input.into() }
    }

    /// Match the regex against the input and returns a match with all its
    /// capture groups bounds or None. If only the overall match is needed, you
    /// should prefer the use of `find` since it can be faster.
    pub fn find_captures<'s>(&self, input: impl Into<Input<'s>>) -> Option<Captures<'s>> {
        let input = input.into();
        let (start, out) = self.run_scan(&input)?;
        let whole = crate::util::Span { from: start, to: out.end };
        Some(Captures::new(input.subject, out.pattern_id, whole, out.captures))
    }

    /// Returns an iterator over all non-overlapping match in the input, with
    /// their capture group bounds. If only the overall match is needed, you
    /// should prefer the use of `find_all` since it can be faster.
    pub fn find_all_captures<'r, 's>(&'r self, input: impl Into<Input<'s>>) -> AllCaptures<'r, 's> {
        AllCaptures { regex: self, input: input.into() }
    }

    pub fn disassemble(&self) -> String {
        disas::disassemble(&self.program)
    }

    /// As [`Regex::disassemble`], but with every pc the matched thread
    /// executed marked in a leading column (§4.C9/§6 "optionally
    /// highlighting PCs from a caller-supplied bitset").
    pub fn disassemble_trace(&self, out: &RunOutput) -> String {
        disas::disassemble_marked(&self.program, Some(&out.visited))
    }

    /// Runs the VM, anchored at `input.span.from` if `input.anchored`,
    /// otherwise retrying at every successive start position within the
    /// span until one matches (§5 "the caller may interleave reads by
    /// passing successive slices into successive runs" generalized to
    /// successive start offsets within one slice). A [`crate::thompson::error::VmError`]
    /// is a program-corruption bug rather than "no match"; it's logged and
    /// surfaced to the caller as no match, since the public API reports
    /// bugs via `log`, not `Result` (matching the original's own split
    /// between `aem_nfa_run`'s return code and its `aem_assert`s).
    fn run_scan(&self, input: &Input<'_>) -> Option<(usize, RunOutput)> {
        if !input.valid() {
            return None;
        }
        let bytes = &input.subject[..input.span.to];
        if input.anchored {
            match pike_vm::run(&self.program, bytes, input.span.from) {
                Ok(Some(out)) => Some((input.span.from, out)),
                Ok(None) => None,
                Err(e) => {
                    log::error!("NFA VM bug on anchored run: {e}");
                    None
                }
            }
        } else {
            for start in input.span.from..=input.span.to {
                match pike_vm::run(&self.program, bytes, start) {
                    Ok(Some(out)) => return Some((start, out)),
                    Ok(None) => continue,
                    Err(e) => {
                        log::error!("NFA VM bug scanning from byte {start}: {e}");
                        return None;
                    }
                }
            }
            None
        }
    }
}

/// Iterator over all matches in a regex.
pub struct AllMatch<'r, 's> {
    regex: &'r Regex,
    input: Input<'s>,
}

impl<'s> Iterator for AllMatch<'_, 's> {
    type Item = Match<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.input.span.valid() {
            return None;
        }
        let m = self.regex.find(self.input.clone())?;
        self.input.span.from = m.next_match_start();
        Some(m)
    }
}

/// Iterator over all matches and their capture groups.
pub struct AllCaptures<'r, 's> {
    regex: &'r Regex,
    input: Input<'s>,
}

impl<'s> Iterator for AllCaptures<'_, 's> {
    type Item = Captures<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.input.span.valid() {
            return None;
        }
        let captures = self.regex.find_captures(self.input.clone())?;
        self.input.span.from = captures.group0().next_match_start();
        Some(captures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pattern_convenience_constructor_matches() {
        let re = Regex::new(r"\d+").unwrap();
        assert!(re.is_match("abc123"));
        assert_eq!(re.find("abc123").unwrap().as_str(), Some("123"));
    }

    #[test]
    fn builder_tags_multiple_patterns_by_id() {
        let mut builder = Builder::new();
        builder.add_pattern(r"\d+", Some(10), "").unwrap();
        builder.add_pattern("zzz", Some(11), "").unwrap();
        let re = builder.build();
        let m = re.find("zzz").unwrap();
        assert_eq!(m.pattern_id, 11);
    }

    #[test]
    fn find_all_yields_every_non_overlapping_match() {
        let re = Regex::new(r"\d+").unwrap();
        let spans: Vec<_> = re.find_all("a1 b22 c333").map(|m| m.as_bytes().to_vec()).collect();
        assert_eq!(spans, vec![b"1".to_vec(), b"22".to_vec(), b"333".to_vec()]);
    }

    #[test]
    fn find_all_advances_past_empty_matches() {
        let re = Regex::new(r"a*").unwrap();
        let matches: Vec<_> = re.find_all("baab").map(|m| m.as_bytes().to_vec()).collect();
        // "b" (0): empty match; "aa" (1..3): consumes both a's; then the
        // zero-width match right after "aa" (3); then, since a nullable
        // pattern always matches at end-of-string too, a final empty match
        // at position 4 — matching the `regex` crate's own trailing-empty-
        // match behavior for this pattern/input.
        assert_eq!(matches, vec![b"".to_vec(), b"aa".to_vec(), b"".to_vec(), b"".to_vec()]);
    }

    #[test]
    fn find_captures_reports_explicit_group_spans() {
        let re = Regex::new("(chicken soup)").unwrap();
        let caps = re.find_captures("chicken soup").unwrap();
        assert_eq!(caps.get(0).unwrap().as_bytes(), b"chicken soup");
    }

    #[test]
    fn unanchored_find_locates_match_after_a_prefix() {
        let re = Regex::new("foo").unwrap();
        let m = re.find("xxxfoo").unwrap();
        assert_eq!((m.span.from, m.span.to), (3, 6));
    }

    #[test]
    fn anchored_input_rejects_a_match_that_starts_later() {
        let re = Regex::new("foo").unwrap();
        let input = Input::from("xxxfoo".as_bytes()).anchored(true);
        assert!(re.find(input).is_none());
    }

    #[test]
    fn disassemble_trace_marks_the_winning_threads_pcs() {
        let re = Regex::new("ab").unwrap();
        let out = pike_vm::run(&re.program, b"ab", 0).unwrap().unwrap();
        let text = re.disassemble_trace(&out);
        assert!(text.lines().next().unwrap().starts_with('*'));
    }

    #[test]
    fn garbage_after_flags_is_rejected() {
        let mut builder = Builder::new();
        assert!(builder.add_pattern("abc", None, "dq").is_err());
    }
}
