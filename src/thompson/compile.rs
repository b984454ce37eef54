//! AST-to-bytecode lowering (§4.C7), grounded on `nfa-compile.c`'s
//! `aem_nfa_node_compile` switch and `aem_nfa_add`'s atomic-rollback
//! wrapper around it.
//!
//! Two lowering shapes are traced instruction-by-instruction against the
//! original rather than invented: alternation's chained-jump structure,
//! and bounded repetition's chained-fork structure (the optimizer's
//! jump-threading pass in `optimize.rs` is precisely what collapses both
//! chains — it is not a cosmetic pass).

use crate::thompson::ast::{Ast, AstKind, UNBOUNDED};
use crate::thompson::error::CompileError;
use crate::thompson::insn::Instruction;
use crate::thompson::program::Program;
use crate::util::Span;

/// Lowers `ast` and appends it to `program` as a new alternative pattern,
/// tagging its terminal `MATCH` with `match_tag`. On failure the program
/// is rolled back to exactly its prior state (`aem_nfa_add`'s contract).
///
/// When called more than once on the same program, a `FORK` is woven in
/// front of the previously-installed entry point so both patterns remain
/// reachable from [`Program::entry_pc`].
pub fn add_pattern(program: &mut Program, ast: &Ast, match_tag: i32) -> Result<(), CompileError> {
    let checkpoint = program.checkpoint();
    let capture_base = program.n_captures();
    let had_previous = !program.is_empty();
    let old_entry = program.entry_pc();

    let fork_pc = if had_previous { Some(program.reserve()) } else { None };
    let new_entry = program.len();

    let mut ctx = CompileCtx { program, capture_base };
    let result = ctx.compile_node(ast).map(|max_capture| {
        ctx.program.append(Instruction::match_(match_tag));
        max_capture
    });

    match result {
        Ok(max_capture) => {
            if let Some(fork_pc) = fork_pc {
                program.put(fork_pc, Instruction::fork(old_entry as u32));
                program.set_entry_pc(fork_pc);
            } else {
                program.set_entry_pc(new_entry);
            }
            // `max_capture` is 0 for any pattern with no parens of its own —
            // never let a capture-free pattern added after a capturing one
            // wipe out the earlier pattern's capture count.
            program.set_n_captures(max_capture.max(capture_base));
            Ok(())
        }
        Err(e) => {
            program.rollback(checkpoint);
            Err(e)
        }
    }
}

struct CompileCtx<'p> {
    program: &'p mut Program,
    capture_base: u32,
}

impl<'p> CompileCtx<'p> {
    /// Lowers one node, returning the number of distinct capture groups
    /// used anywhere in the subtree (absolute, including `capture_base`).
    fn compile_node(&mut self, ast: &Ast) -> Result<u32, CompileError> {
        match &ast.kind {
            AstKind::Range { min, max } => {
                let pc = self.program.append(Instruction::range(*min, *max));
                self.program.set_dbg(pc, ast.span);
                Ok(0)
            }
            AstKind::Class { class, neg, frontier } => {
                let pc = self.program.append(Instruction::class(*neg, *frontier, *class));
                self.program.set_dbg(pc, ast.span);
                Ok(0)
            }
            AstKind::Atom { codepoint, .. } => self.compile_atom(*codepoint, ast.span),
            AstKind::Capture { index, child } => self.compile_capture(*index, child, ast.span),
            AstKind::Branch { children } => self.compile_branch(children),
            AstKind::Alternation { children } => self.compile_alternation(children),
            AstKind::Brackets { children } => self.compile_alternation(children),
            AstKind::Repeat { min, max, reluctant, child } => {
                self.compile_repeat(*min, *max, *reluctant, child)
            }
        }
    }

    /// A literal codepoint becomes one `RANGE` per UTF-8 byte, matched in
    /// sequence — non-ASCII atoms never need bracket-style expansion.
    fn compile_atom(&mut self, codepoint: char, span: Span) -> Result<u32, CompileError> {
        let mut buf = [0u8; 4];
        let bytes = codepoint.encode_utf8(&mut buf).as_bytes();
        for &b in bytes {
            let pc = self.program.append(Instruction::range(b, b));
            self.program.set_dbg(pc, span);
        }
        Ok(0)
    }

    fn compile_capture(&mut self, index: u32, child: &Ast, span: Span) -> Result<u32, CompileError> {
        let group = self.capture_base + index;
        let pc = self.program.append(Instruction::capture(false, group));
        self.program.set_dbg(pc, span);
        let inner_max = self.compile_node(child)?;
        let pc_end = self.program.append(Instruction::capture(true, group));
        self.program.set_dbg(pc_end, span);
        Ok((group + 1).max(inner_max))
    }

    fn compile_branch(&mut self, children: &[Ast]) -> Result<u32, CompileError> {
        let mut max_capture = 0;
        for child in children {
            max_capture = max_capture.max(self.compile_node(child)?);
        }
        Ok(max_capture)
    }

    /// Branch-of-alternatives lowering, shared by `ALTERNATION` and
    /// `BRACKETS` (a bracket expression is exactly an alternation of
    /// single-instruction byte tests).
    ///
    /// Raw shape for branches `b0..bn`:
    /// ```text
    /// fork L1; <b0>; jmp J1
    /// L1: fork L2; <b1>; jmp J2
    /// L2: <b2>                    (last branch: no fork, no trailing jmp)
    /// ```
    /// Each `jmp Ji` targets the position of `jmp J(i+1)`, chaining to the
    /// next pending jump rather than straight to the true end — this is
    /// the shape `original_source/nfa-compile.c`'s `aem_nfa_node_gen_alternation`
    /// actually produces; `optimize::jump_thread` collapses the chain.
    fn compile_alternation(&mut self, branches: &[Ast]) -> Result<u32, CompileError> {
        if branches.is_empty() {
            return Ok(0);
        }
        if branches.len() == 1 {
            return self.compile_node(&branches[0]);
        }
        let mut max_capture = 0;
        let mut jmp_pcs = Vec::new();
        for (i, branch) in branches.iter().enumerate() {
            let is_last = i == branches.len() - 1;
            if is_last {
                max_capture = max_capture.max(self.compile_node(branch)?);
                continue;
            }
            let fork_pc = self.program.reserve();
            max_capture = max_capture.max(self.compile_node(branch)?);
            let jmp_pc = self.program.reserve();
            jmp_pcs.push(jmp_pc);
            let next_branch_entry = self.program.len() as u32;
            self.program.put(fork_pc, Instruction::fork(next_branch_entry));
        }
        let end = self.program.len() as u32;
        for (i, &jmp_pc) in jmp_pcs.iter().enumerate() {
            let target = jmp_pcs.get(i + 1).copied().map(|p| p as u32).unwrap_or(end);
            self.program.put(jmp_pc, Instruction::jmp(target));
        }
        Ok(max_capture)
    }

    /// Bounded/unbounded repetition lowering (§4.C7 REPEAT).
    fn compile_repeat(&mut self, min: u32, max: u32, reluctant: bool, child: &Ast) -> Result<u32, CompileError> {
        if reluctant {
            return Err(CompileError::ReluctantRepetitionNyi);
        }
        if min > max {
            return Err(CompileError::InvalidRepeatBounds { min, max });
        }
        if max == UNBOUNDED && is_nullable(child) {
            return Err(CompileError::EmptyUnboundedRepeat);
        }
        if min == 0 && max == 0 {
            return Ok(0);
        }

        let entry = self.program.len();
        let mut max_capture = 0;
        let mut last_rep = entry;
        for i in 0..min {
            let rep = self.program.len();
            max_capture = max_capture.max(self.compile_node(child)?);
            last_rep = rep;
            if i == 0 {
                // `nfa-compile.c`'s own emission-size heuristic: estimate the
                // unrolled cost from the first mandatory copy's instruction
                // count times the total number of copies this repeat will emit.
                let copy_len = (self.program.len() - rep) as u64;
                let count = if max == UNBOUNDED { min as u64 } else { max as u64 };
                let est = copy_len * count;
                if est > 10_000 {
                    log::warn!("repetition will cost at least {est} NFA ops");
                }
            }
        }

        // Empty-body detection (`nfa-compile.c`: `if (repeat.min && nfa->n_insns
        // == entry)`): a mandatory repetition whose child compiled to zero
        // instructions is treated as identity rather than looped forever.
        if min > 0 && self.program.len() == entry {
            log::warn!("empty repetition");
            return Ok(max_capture);
        }

        if max == UNBOUNDED {
            if min >= 1 {
                // Greedy plus: `FORK back_to_last_rep`, pointing at the
                // already-emitted last mandatory copy — no further copy of
                // `child` is compiled.
                self.program.append(Instruction::fork(last_rep as u32));
                return Ok(max_capture);
            }
            // `L: fork END; <child>; jmp L; END:`
            let loop_pc = self.program.reserve();
            max_capture = max_capture.max(self.compile_node(child)?);
            self.program.append(Instruction::jmp(loop_pc as u32));
            let end = self.program.len() as u32;
            self.program.put(loop_pc, Instruction::fork(end));
            return Ok(max_capture);
        }

        let optional = max - min;
        if optional == 0 {
            return Ok(max_capture);
        }

        // Per-iteration-chained forks: each optional copy's fork targets
        // the *next* copy's fork, not the true end directly.
        // original_source/nfa-compile.c carries its own unresolved
        // `// TODO: Patch all the forks to go all the way to the end,
        // instead of each forking to the next.` at exactly this point —
        // preserved here rather than "fixed", since `optimize::jump_thread`
        // is what actually collapses the chain at compile time.
        let mut fork_pcs = Vec::with_capacity(optional as usize);
        for _ in 0..optional {
            let fork_pc = self.program.reserve();
            fork_pcs.push(fork_pc);
            max_capture = max_capture.max(self.compile_node(child)?);
        }
        let end = self.program.len() as u32;
        for (i, &fork_pc) in fork_pcs.iter().enumerate() {
            let target = fork_pcs.get(i + 1).copied().map(|p| p as u32).unwrap_or(end);
            self.program.put(fork_pc, Instruction::fork(target));
        }
        Ok(max_capture)
    }
}

/// Whether `ast` can match the empty string — used to reject `{min,}`
/// repetition of a nullable child before it can drive the VM into a
/// non-terminating scheduling loop (zero-width-only threads that never
/// consume a byte, forking forever).
fn is_nullable(ast: &Ast) -> bool {
    match &ast.kind {
        AstKind::Range { .. } | AstKind::Atom { .. } | AstKind::Brackets { .. } => false,
        AstKind::Class { frontier, .. } => *frontier,
        AstKind::Capture { child, .. } => is_nullable(child),
        AstKind::Repeat { min, child, .. } => *min == 0 || is_nullable(child),
        AstKind::Branch { children } => children.iter().all(is_nullable),
        AstKind::Alternation { children } => children.iter().any(is_nullable),
    }
}
