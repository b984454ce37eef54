//! Bytecode optimizer (§4.C8).
//!
//! `compile.rs` deliberately lowers alternation and bounded repetition as
//! *chains* (each jump/fork pointing at the next pending one, not at the
//! true end) because that is what `original_source/nfa-compile.c` itself
//! emits. This module is what actually collapses those chains — it is
//! load-bearing, not cosmetic.

use crate::thompson::insn::{Insn, Instruction};
use crate::thompson::program::Program;
use std::collections::HashSet;

/// Runs every pass in sequence. Safe to call on an empty program.
pub fn optimize(program: &mut Program) {
    thread_jumps_to_fixed_point(program);
    let initial = split_initial_forks(program);
    program.set_initial_pcs(initial);
    mark_reachable(program);
}

/// Rewrites every `JMP`/`FORK` target to point directly at the end of its
/// chain of pending jumps, instead of at the next link. Iterates to a
/// fixed point: a single sweep already resolves every chain in full (each
/// rewrite follows the chain to its terminal non-`JMP` instruction), but
/// looping defensively until nothing changes costs nothing on an already-
/// threaded program and guards against any future lowering shape that
/// isn't already fully resolved in one pass.
pub fn thread_jumps_to_fixed_point(program: &mut Program) {
    loop {
        let before: Vec<Instruction> = program.insns_snapshot().to_vec();
        jump_thread(program);
        if program.insns_snapshot() == before.as_slice() {
            break;
        }
    }
}

fn jump_thread(program: &mut Program) {
    for pc in 0..program.len() {
        match program.get(pc).decode() {
            Insn::Jmp { target } => {
                let resolved = resolve_chain(program, target);
                if resolved != target {
                    program.put(pc, Instruction::jmp(resolved));
                }
            }
            Insn::Fork { target } => {
                let resolved = resolve_chain(program, target);
                if resolved != target {
                    program.put(pc, Instruction::fork(resolved));
                }
            }
            _ => {}
        }
    }
}

fn resolve_chain(program: &Program, start: u32) -> u32 {
    let mut pc = start;
    let mut seen = HashSet::new();
    while let Insn::Jmp { target } = program.get(pc as usize).decode() {
        if !seen.insert(pc) {
            log::error!("cyclic jmp chain detected at pc {pc}, breaking thread there");
            break;
        }
        pc = target;
    }
    pc
}

/// Flattens the chain of `FORK`s that `compile::add_pattern` weaves
/// together when several patterns are added to the same program (each
/// addition forks to the previous entry point) into one explicit list of
/// top-level start pcs. This lets the VM seed its first step's thread set
/// in one pass instead of re-walking a potentially long fork chain.
pub fn split_initial_forks(program: &Program) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut pc = program.entry_pc();
    let mut seen = HashSet::new();
    loop {
        if pc >= program.len() || !seen.insert(pc) {
            break;
        }
        match program.get(pc).decode() {
            Insn::Fork { target } => {
                starts.push(pc + 1);
                pc = target as usize;
            }
            _ => {
                starts.push(pc);
                break;
            }
        }
    }
    starts
}

/// Marks every pc reachable from `entry_pc` without ever requiring
/// unreachable code to be physically removed — reachability is recorded
/// for `disas::disassemble` to annotate, nothing more. A pattern that
/// compiles cleanly should never have unreachable instructions, so this
/// mask exists chiefly to make a broken lowering visible in debug output.
pub fn mark_reachable(program: &mut Program) {
    let len = program.len();
    let mut visited = vec![false; len];
    let mut stack = vec![program.entry_pc()];
    while let Some(pc) = stack.pop() {
        if pc >= len || visited[pc] {
            continue;
        }
        visited[pc] = true;
        match program.get(pc).decode() {
            Insn::Jmp { target } => stack.push(target as usize),
            Insn::Fork { target } => {
                stack.push(target as usize);
                stack.push(pc + 1);
            }
            Insn::Match { .. } => {}
            Insn::Range { .. } | Insn::Class { .. } | Insn::Capture { .. } => stack.push(pc + 1),
        }
    }
    program.set_reachable(visited);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thompson::compile::add_pattern;
    use crate::thompson::flags::Flags;
    use crate::thompson::parser::parse;

    #[test]
    fn jump_thread_collapses_alternation_chain() {
        let (ast, _) = parse("a|b|c", Flags::NONE).unwrap();
        let mut program = Program::new();
        add_pattern(&mut program, &ast, 0).unwrap();
        let end = program.len() as u32;
        optimize(&mut program);
        for pc in 0..program.len() {
            match program.get(pc).decode() {
                Insn::Jmp { target } => assert_eq!(target, end, "every jmp should now target the true end"),
                _ => {}
            }
        }
    }

    #[test]
    fn jump_thread_collapses_bounded_repeat_chain() {
        let (ast, _) = parse("a{2,4}", Flags::NONE).unwrap();
        let mut program = Program::new();
        add_pattern(&mut program, &ast, 0).unwrap();
        let end = program.len() as u32;
        optimize(&mut program);
        for pc in 0..program.len() {
            if let Insn::Fork { target } = program.get(pc).decode() {
                assert_eq!(target, end, "every optional-copy fork should now target the true end");
            }
        }
    }

    #[test]
    fn mark_reachable_flags_every_live_instruction_on_a_clean_compile() {
        let (ast, _) = parse("a(b|c)*d", Flags::NONE).unwrap();
        let mut program = Program::new();
        add_pattern(&mut program, &ast, 0).unwrap();
        optimize(&mut program);
        for pc in 0..program.len() {
            assert_eq!(program.is_reachable(pc), Some(true), "pc {pc} should be reachable");
        }
    }

    #[test]
    fn split_initial_forks_lists_every_top_level_pattern() {
        let (a1, _) = parse("a", Flags::NONE).unwrap();
        let (a2, _) = parse("b", Flags::NONE).unwrap();
        let mut program = Program::new();
        add_pattern(&mut program, &a1, 0).unwrap();
        add_pattern(&mut program, &a2, 1).unwrap();
        let starts = split_initial_forks(&program);
        assert_eq!(starts.len(), 2);
    }
}
