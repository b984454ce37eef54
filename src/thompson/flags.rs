//! Regex flag letters (§4.C3 "Groups and flags").
//!
//! Grounded on `nfa-compile.c`'s `AEM_REGEX_FLAGS_DEFINE` X-macro table and
//! `aem_regex_flags_{parse,adj,describe}`. Each flag letter carries a
//! "safe in sandbox" bit: in sandboxed contexts (e.g. patterns supplied by
//! an untrusted caller), only safe flags may be toggled.

use std::ops::{BitOr, BitOrAssign};

/// A set of regex flags, packed into a byte (only 3 are defined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

struct FlagDef {
    letter: char,
    bit: Flags,
    safe_in_sandbox: bool,
}

const FLAG_TABLE: &[FlagDef] = &[
    FlagDef { letter: 'd', bit: Flags::DEBUG, safe_in_sandbox: false },
    FlagDef { letter: 'c', bit: Flags::EXPLICIT_CAPTURES, safe_in_sandbox: true },
    FlagDef { letter: 'b', bit: Flags::BINARY, safe_in_sandbox: true },
];

impl Flags {
    /// Preserve source spans in instruction debug info.
    pub const DEBUG: Flags = Flags(1 << 0);
    /// Treat a group containing only an alternation as non-capturing by
    /// default; require explicit capture otherwise.
    pub const EXPLICIT_CAPTURES: Flags = Flags(1 << 1);
    /// `.` matches any byte, not just printable/tab; disables UTF-8 range
    /// expansion of bracket classes.
    pub const BINARY: Flags = Flags(1 << 2);

    pub const NONE: Flags = Flags(0);

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    /// Parse a run of enabling flag letters, honoring the sandbox filter.
    /// Returns the parsed set and how many bytes of `input` were consumed.
    pub fn parse(input: &str, sandbox: bool) -> (Flags, usize) {
        let mut flags = Flags::NONE;
        let mut consumed = 0;
        let bytes = input.as_bytes();
        while consumed < bytes.len() {
            let c = bytes[consumed] as char;
            match FLAG_TABLE.iter().find(|def| def.letter == c) {
                Some(def) if def.safe_in_sandbox || !sandbox => {
                    flags.insert(def.bit);
                    consumed += 1;
                }
                _ => break,
            }
        }
        (flags, consumed)
    }

    /// Parse an enable-set, then an optional `-` followed by a disable-set,
    /// starting from `base` (`aem_regex_flags_adj`).
    pub fn adj(input: &str, base: Flags, sandbox: bool) -> (Flags, usize) {
        let mut flags = base;
        let (enabled, mut consumed) = Flags::parse(input, sandbox);
        flags.insert(enabled);
        if input[consumed..].starts_with('-') {
            consumed += 1;
            let (disabled, n) = Flags::parse(&input[consumed..], sandbox);
            flags.remove(disabled);
            consumed += n;
        }
        (flags, consumed)
    }

    /// Render the enabled letters, then (if any flags are disabled and
    /// sandbox-visible) a `-` and the disabled letters.
    pub fn describe(self, sandbox: bool) -> String {
        let mut out = String::new();
        for def in FLAG_TABLE {
            if self.contains(def.bit) && (def.safe_in_sandbox || !sandbox) {
                out.push(def.letter);
            }
        }
        let checkpoint = out.len();
        out.push('-');
        for def in FLAG_TABLE {
            if !self.contains(def.bit) && (def.safe_in_sandbox || !sandbox) {
                out.push(def.letter);
            }
        }
        if out.len() == checkpoint + 1 {
            out.truncate(checkpoint);
        }
        out
    }
}

impl BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stops_at_first_unknown_letter() {
        let (flags, n) = Flags::parse("cbX", false);
        assert!(flags.contains(Flags::EXPLICIT_CAPTURES));
        assert!(flags.contains(Flags::BINARY));
        assert_eq!(n, 2);
    }

    #[test]
    fn sandbox_skips_unsafe_letters() {
        let (flags, n) = Flags::parse("dc", true);
        assert!(!flags.contains(Flags::DEBUG));
        assert!(flags.contains(Flags::EXPLICIT_CAPTURES));
        assert_eq!(n, 1, "the unsafe 'd' halts parsing rather than being skipped over");
    }

    #[test]
    fn adj_applies_enable_then_disable() {
        let (flags, n) = Flags::adj("b-c", Flags::EXPLICIT_CAPTURES, false);
        assert!(flags.contains(Flags::BINARY));
        assert!(!flags.contains(Flags::EXPLICIT_CAPTURES));
        assert_eq!(n, 3);
    }

    #[test]
    fn describe_parse_roundtrip_p6() {
        for bits in 0u8..8 {
            let flags = Flags(bits);
            let described = flags.describe(false);
            let (parsed, consumed) = Flags::adj(&described, Flags::NONE, false);
            assert_eq!(consumed, described.len());
            assert_eq!(parsed, flags, "describe({flags:?}) = {described:?} did not parse back to the same set");
        }
    }

    #[test]
    fn describe_omits_trailing_dash_when_nothing_disabled() {
        assert_eq!(Flags::BINARY.describe(true), "b");
    }
}
