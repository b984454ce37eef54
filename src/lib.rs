//! # gregex
//!
//! **gregex** is a small regular expression engine built around a hand-written
//! parser/compiler and a Pike-style parallel NFA VM.
//!
//! ## Features
//!
//! - A grammar close to POSIX extended regular expressions, plus `\w\W\d\D\s\S`
//!   shortcuts, POSIX named classes (`[:alpha:]` and friends), and frontier
//!   assertions (`^` `$` `\<` `\>` `\A` `\z`).
//! - Per-pattern flags (`d` preserve debug spans, `c` explicit captures,
//!   `b` binary/any-byte `.`), parsed the same way the grammar itself is.
//! - One compiled [`Regex`] may hold several registered patterns, each
//!   tagged with its own match id.
//!
//! ## Usage
//!
//! ```rust
//! use gregex::Regex;
//!
//! let re = Regex::new(r"\d+").unwrap();
//! assert!(re.is_match("abc123"));
//! let mat = re.find("abc123").unwrap();
//! assert_eq!(mat.as_str(), Some("123"));
//! ```
//!
//! ## Crate Organization
//!
//! - `regex`: [`Builder`]/[`Regex`] — the public compile-then-match API.
//! - `thompson`: parser, compiler, optimizer, disassembler and VM.
//! - `util`: shared `Input`/`Span`/`Match`/`Captures` types.
//!
//! ## License
//!
//! Licensed under MIT or Apache-2.0.

pub mod regex;
pub mod thompson;
pub mod util;

pub use regex::Builder;
pub use regex::Regex;
