//! Bytecode disassembler (§4.C9), grounded on `nfa-compile.c`'s
//! `aem_nfa_dump`: one line per instruction, annotated with the source
//! span when the pattern was compiled under the `d` flag.

use crate::thompson::insn::Insn;
use crate::thompson::program::{Bitset, Program};
use std::fmt::Write as _;

/// Renders every instruction in `program` as one line: pc, mnemonic,
/// operands, an optional `unreachable` marker (once `optimize::mark_reachable`
/// has run), and an optional source span. Equivalent to
/// `disassemble_marked(program, None)`.
pub fn disassemble(program: &Program) -> String {
    disassemble_marked(program, None)
}

/// As [`disassemble`], but with an extra leading column marking every pc
/// set in `marks` with `*` (§4.C9's "optional mark column driven by a
/// caller-supplied bitset" — typically [`crate::thompson::pike_vm::RunOutput::visited`],
/// to render which instructions the winning thread of a match actually
/// executed).
pub fn disassemble_marked(program: &Program, marks: Option<&Bitset>) -> String {
    let mut out = String::new();
    let width = program.len().to_string().len().max(1);
    for pc in 0..program.len() {
        let mark = match marks {
            Some(bits) if bits.get(pc) => "*",
            Some(_) => " ",
            None => "",
        };
        let marker = match program.is_reachable(pc) {
            Some(false) => "  ; unreachable",
            _ => "",
        };
        let span = program
            .dbg_span(pc)
            .map(|s| format!("  ; [{}, {})", s.from, s.to))
            .unwrap_or_default();
        let _ = writeln!(out, "{mark}{pc:>width$}: {}{marker}{span}", mnemonic(program.get(pc).decode()), width = width);
    }
    out
}

fn mnemonic(insn: Insn) -> String {
    match insn {
        Insn::Range { lo, hi } if lo == hi => format!("range {lo:#04x}"),
        Insn::Range { lo, hi } => format!("range {lo:#04x}-{hi:#04x}"),
        Insn::Class { neg, frontier, class } => {
            format!("class {}{}{}", if neg { "^" } else { "" }, class.name(), if frontier { " (frontier)" } else { "" })
        }
        Insn::Capture { end, index } => format!("capture {} {index}", if end { "end" } else { "start" }),
        Insn::Match { tag } => format!("match {tag}"),
        Insn::Jmp { target } => format!("jmp {target}"),
        Insn::Fork { target } => format!("fork {target}"),
    }
}
