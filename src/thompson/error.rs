//! Error taxonomy for pattern parsing, compilation and execution.
//!
//! Mirrors `aem_logf_ctx(AEM_LOG_ERROR, ...)` call sites in the original
//! `regex.c`/`nfa-compile.c`: malformed syntax and semantic mistakes are
//! reported as structured errors rather than sentinel return codes, so the
//! atomic-rollback contract (a failed `add_pattern` leaves the program
//! untouched) has a clear success/failure discriminant to dispatch on.

use thiserror::Error;

/// Malformed pattern syntax: unmatched brackets, garbage after the pattern
/// or after the flag text, bad bounds syntax.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unmatched '[' in bracket expression")]
    UnterminatedBracket,
    #[error("empty bracket expression")]
    EmptyBrackets,
    #[error("invalid named class {0:?}")]
    InvalidNamedClass(String),
    #[error("unmatched '(' in group")]
    UnterminatedGroup,
    #[error("unexpected ')'")]
    UnmatchedCloseParen,
    #[error("garbage after flags: {0:?}")]
    GarbageAfterFlags(String),
    #[error("garbage after pattern: {0:?}")]
    GarbageAfterPattern(String),
    #[error("invalid repetition bounds")]
    InvalidBoundsSyntax,
    #[error("unsupported syntax: {0}")]
    UnsupportedSyntax(&'static str),
    #[error("unexpected end of pattern")]
    UnexpectedEof,
}

/// Errors raised while lowering an AST to bytecode (§4.C7), on top of
/// whatever parse error is being propagated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("repetition min {min} > max {max}")]
    InvalidRepeatBounds { min: u32, max: u32 },
    #[error("invalid byte range {lo:#x}..={hi:#x}")]
    InvalidByteRange { lo: u32, hi: u32 },
    #[error("nothing inside {{,}}")]
    EmptyUnboundedRepeat,
    #[error("reluctant repetition operators are not yet implemented")]
    ReluctantRepetitionNyi,
    #[error("UTF-8 range expansion of bracket classes is not yet implemented")]
    Utf8RangeExpansionNyi,
}

/// A fatal invariant violation discovered by the VM at run time, distinct
/// from "no match" so that test suites can assert no bug ever fires on
/// well-formed input (§7).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid opcode decoded at pc {0}")]
    InvalidOpcode(usize),
    #[error("jump/fork target {0} out of range")]
    PcOutOfRange(usize),
    #[error("capture index {0} out of range")]
    CaptureOutOfRange(usize),
}
