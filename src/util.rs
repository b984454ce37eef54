/*!
This modules contains all utils types and functions used accross the whole project,
and in particular accross the parser, compiler and VM.

Unlike a single-pattern, char-indexed `&str` API, every type here carries a
`pattern_id` (the `MATCH(tag)` that fired, per §3/§6) since one compiled
[`crate::thompson::program::Program`] may hold several registered patterns,
and spans are byte offsets into an arbitrary `&[u8]` rather than `char`
offsets into a `&str` — the VM matches bytes, not codepoints (§1).
*/

use std::ops::Range;

/// Defines the input paramter to most matching methods on a [`crate::Regex`].
/// Since all values other than subject have a default value it's always
/// sufficient to only provide the subject bytes to all matching methods,
/// but for cases where we need more control (when finding all matches for instance)
/// this types come handy.
#[derive(Clone)]
pub struct Input<'s> {
    /// The subject bytes against which the program is matched.
    pub subject: &'s [u8],
    /// Perform the match within that span (but take the surroundings into accounts)
    /// Default: 0..subject.len()
    pub span: Span,
    /// Whenever the match should be anchored at the start of span.
    /// Default: false
    pub anchored: bool,
}

impl<'s> Input<'s> {
    pub fn new(subject: &'s [u8]) -> Self {
        Self {
            subject,
            span: (0..subject.len()).into(),
            anchored: false,
        }
    }

    pub fn anchored(mut self, value: bool) -> Self {
        self.anchored = value;
        self
    }

    pub fn valid(&self) -> bool {
        self.span.valid() && self.span.to <= self.subject.len()
    }
}

impl<'s> From<&'s [u8]> for Input<'s> {
    fn from(subject: &'s [u8]) -> Self {
        Self::new(subject)
    }
}

impl<'s> From<&'s str> for Input<'s> {
    fn from(subject: &'s str) -> Self {
        Self::new(subject.as_bytes())
    }
}

/// A byte-offset span `[from, to)` into an [`Input`]'s subject. Similar to
/// [`std::ops::Range`], but implements Copy.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    pub fn empty(&self) -> bool {
        self.from == self.to
    }

    pub fn valid(&self) -> bool {
        self.from <= self.to
    }

    /// The sentinel for "this capture group was never entered" (`from > to`,
    /// so [`Span::valid`] is false).
    pub fn invalid() -> Span {
        Span { from: 1, to: 0 }
    }
}

impl From<Range<usize>> for Span {
    fn from(value: Range<usize>) -> Self {
        Self {
            from: value.start,
            to: value.end,
        }
    }
}

impl From<Span> for Range<usize> {
    fn from(val: Span) -> Self {
        val.from..val.to
    }
}

/// Successful non-capturing match. Contains the bounds of the overall match
/// plus the id of the pattern (the `MATCH(tag)`) that produced it.
#[derive(Copy, Debug, Clone)]
pub struct Match<'s> {
    pub subject: &'s [u8],
    pub pattern_id: i32,
    pub span: Span,
}

impl<'s> Match<'s> {
    pub fn new(subject: &'s [u8], pattern_id: i32, span: impl Into<Span>) -> Self {
        let span = span.into();
        Self { subject, pattern_id, span }
    }

    pub fn as_bytes(&self) -> &'s [u8] {
        &self.subject[self.span.from..self.span.to]
    }

    /// The matched bytes, decoded as UTF-8, or `None` if they aren't valid
    /// UTF-8 — the engine matches arbitrary bytes (§1), so this is a
    /// best-effort convenience rather than a guarantee.
    pub fn as_str(&self) -> Option<&'s str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    /// Returns the byte-index where the next non-overlapping
    /// match could start. This take into account empty match.
    pub fn next_match_start(&self) -> usize {
        if self.span.empty() {
            // Advance by one byte rather than one codepoint: once a pattern
            // is compiled the engine has no notion of codepoints, only
            // bytes (§1 — arbitrary byte input).
            self.span.to + 1
        } else {
            self.span.to
        }
    }
}

/// Successful capturing match. Contains the bounds of the overall match,
/// the bounds (if any) of every explicit capture group defined in the
/// pattern, and which registered pattern matched.
///
/// Unlike the `regex` crate, this grammar has no implicit whole-match
/// group 0 folded into the explicit capture indices (§9 Design Notes /
/// `DESIGN.md` Open Question resolutions): a pattern with no parens has
/// zero explicit groups, and `(chicken soup)`'s sole group sits at index
/// 0. [`Captures::whole`]/[`Captures::group0`] track the overall match
/// span out-of-band from [`Captures::get`]'s explicit-group array so the
/// former is always present even when the latter is empty.
#[derive(Debug, Clone)]
pub struct Captures<'s> {
    subject: &'s [u8],
    pattern_id: i32,
    whole: Span,
    spans: Box<[Span]>,
}

impl<'s> Captures<'s> {
    pub fn new(subject: &'s [u8], pattern_id: i32, whole: Span, spans: Box<[Span]>) -> Self {
        Self { subject, pattern_id, whole, spans }
    }

    pub fn pattern_id(&self) -> i32 {
        self.pattern_id
    }

    /// An explicit capture group's span, by the index assigned at parse
    /// time (§4.C3/C5 "Capture indices are assigned in lexical order").
    /// `None` if the pattern has no such group, or the group's branch of
    /// an alternation never executed.
    pub fn get(&self, group_index: usize) -> Option<Match<'s>> {
        let span = *self.spans.get(group_index)?;
        if !span.valid() {
            return None;
        }

        Some(Match {
            subject: self.subject,
            pattern_id: self.pattern_id,
            span,
        })
    }

    /// The overall match span — always present, regardless of whether the
    /// pattern has any explicit capture groups of its own.
    pub fn group0(&self) -> Match<'s> {
        Match { subject: self.subject, pattern_id: self.pattern_id, span: self.whole }
    }

    pub fn group_len(&self) -> usize {
        self.spans.len()
    }

    // TODO: Add an iterator over groups
    // and one over all matched groups maybe?
}
