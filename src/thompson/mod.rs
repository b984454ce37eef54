//! The NFA engine, built on Thompson's construction: pattern grammar (C3/C5),
//! literal-string compiler (C6), AST-to-bytecode lowering (C7), a jump-
//! threading/reachability optimizer (C8), a disassembler (C9) and a
//! Pike-style parallel VM (C10).
//!
//! `src/regex.rs` is the only caller outside this module that needs to know
//! these pieces exist; everything below is assembled there into the public
//! [`crate::Regex`]/[`crate::Builder`] API.

pub mod ast;
pub mod compile;
pub mod disas;
pub mod error;
pub mod flags;
pub mod insn;
pub mod optimize;
pub mod parser;
pub mod pike_vm;
pub mod program;
