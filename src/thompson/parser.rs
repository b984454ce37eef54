//! Regex grammar parser (§4.C3/C5) and literal-string compiler (§4.C6).
//!
//! A hand-written recursive-descent parser, grounded on `regex.c`'s
//! `re_parse_{pattern,branch,postfix,atom,brackets,named_class}` family.
//! Unlike the teacher's `regex_syntax`-based HIR front end, this grammar
//! has its own escape table, POSIX named classes, frontier assertions and
//! `d`/`c`/`b` flag letters, so it is written from scratch rather than
//! adapted from an existing parser.
//!
//! ```text
//! pattern     := branch ( "|" branch )*
//! branch      := postfix*
//! postfix     := atom ( "?" | "*" | "+" | "{" bounds "}" ) "?"?
//! bounds      := [0-9]* ( "," [0-9]* )?
//! atom        := brackets | group | escape | literal
//! group       := "(" ( "?" flag-adj ":"? )? pattern ")"
//! brackets    := "[" "^"? range+ "]"
//! range       := named-class | ( escape ( "-" escape )? )
//! named-class := "[:" "^"? name ":]"
//! escape      := "\\" esc-char | rune
//! ```

use crate::thompson::ast::{Ast, AstKind, EscKind};
use crate::thompson::error::ParseError;
use crate::thompson::flags::Flags;
use crate::thompson::insn::CClass;
use crate::util::Span;

/// A byte-position-tracking cursor over the pattern's characters.
struct Cursor<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    idx: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            idx: 0,
        }
    }

    fn byte_pos(&self) -> usize {
        self.chars.get(self.idx).map(|(p, _)| *p).unwrap_or(self.text.len())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.idx += 1;
        }
        c
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn at_eof(&self) -> bool {
        self.peek().is_none()
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.byte_pos()..]
    }
}

pub struct Parser<'a> {
    cur: Cursor<'a>,
    next_capture: u32,
}

/// Parse a complete pattern, starting capture numbering at 0.
/// Returns the AST and the number of capture groups assigned.
pub fn parse(text: &str, flags: Flags) -> Result<(Ast, u32), ParseError> {
    let mut parser = Parser {
        cur: Cursor::new(text),
        next_capture: 0,
    };
    let ast = parser.parse_pattern(flags)?;
    if !parser.cur.at_eof() {
        return Err(ParseError::GarbageAfterPattern(parser.cur.remaining().to_string()));
    }
    Ok((ast, parser.next_capture))
}

/// §4.C6: text as a plain sequence of UTF-8 codepoints, one `ATOM` each.
pub fn compile_literal(text: &str) -> Ast {
    let children: Vec<Ast> = text
        .char_indices()
        .map(|(i, c)| {
            Ast::new(
                AstKind::Atom { codepoint: c, esc_kind: EscKind::None },
                Span { from: i, to: i + c.len_utf8() },
            )
        })
        .collect();
    Ast::new(AstKind::Branch { children }, Span { from: 0, to: text.len() })
}

/// Maps an escape letter to the `(class, neg, frontier)` triple used for
/// class shortcuts (`\w\W\d\D\s\S`) and frontier assertions (`\<\>\A\z`).
/// `\<`/`\>` reuse `alnum` as the word-character partition (this grammar
/// has no dedicated "word" class); `\A`/`\z` use `any` for string
/// boundaries, distinct from `^`/`$`'s `line` boundary.
fn escape_class(c: char) -> Option<(CClass, bool, bool)> {
    match c {
        'w' => Some((CClass::Alnum, false, false)),
        'W' => Some((CClass::Alnum, true, false)),
        'd' => Some((CClass::Digit, false, false)),
        'D' => Some((CClass::Digit, true, false)),
        's' => Some((CClass::Space, false, false)),
        'S' => Some((CClass::Space, true, false)),
        '<' => Some((CClass::Alnum, false, true)),
        '>' => Some((CClass::Alnum, true, true)),
        'A' => Some((CClass::Any, false, true)),
        'z' => Some((CClass::Any, true, true)),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    fn parse_pattern(&mut self, flags: Flags) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        let mut branches = vec![self.parse_branch(flags)?];
        while self.cur.eat('|') {
            branches.push(self.parse_branch(flags)?);
        }
        let span = Span { from: start, to: self.cur.byte_pos() };
        if branches.len() == 1 {
            Ok(branches.pop().unwrap())
        } else {
            Ok(Ast::new(AstKind::Alternation { children: branches }, span))
        }
    }

    fn parse_branch(&mut self, flags: Flags) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        let mut children = Vec::new();
        while !matches!(self.cur.peek(), None | Some('|') | Some(')')) {
            children.push(self.parse_postfix(flags)?);
        }
        let span = Span { from: start, to: self.cur.byte_pos() };
        Ok(Ast::new(AstKind::Branch { children }, span))
    }

    fn parse_postfix(&mut self, flags: Flags) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        let mut node = self.parse_atom(flags)?;
        loop {
            let bounds = match self.cur.peek() {
                Some('?') => {
                    self.cur.bump();
                    (0, 1)
                }
                Some('*') => {
                    self.cur.bump();
                    (0, super::ast::UNBOUNDED)
                }
                Some('+') => {
                    self.cur.bump();
                    (1, super::ast::UNBOUNDED)
                }
                Some('{') => {
                    let save = self.cur.idx;
                    self.cur.bump();
                    match self.parse_bounds() {
                        Ok(bounds) => bounds,
                        Err(_) => {
                            self.cur.idx = save;
                            break;
                        }
                    }
                }
                _ => break,
            };
            let reluctant = self.cur.eat('?');
            let span = Span { from: start, to: self.cur.byte_pos() };
            node = Ast::new(
                AstKind::Repeat { min: bounds.0, max: bounds.1, reluctant, child: Box::new(node) },
                span,
            );
        }
        Ok(node)
    }

    fn parse_bounds(&mut self) -> Result<(u32, u32), ParseError> {
        let min_str = self.parse_digits();
        if self.cur.eat(',') {
            let max_str = self.parse_digits();
            let min = Self::parse_bound_digits(&min_str, 0)?;
            let max = Self::parse_bound_digits(&max_str, super::ast::UNBOUNDED)?;
            if !self.cur.eat('}') {
                return Err(ParseError::InvalidBoundsSyntax);
            }
            Ok((min, max))
        } else {
            if min_str.is_empty() {
                return Err(ParseError::InvalidBoundsSyntax);
            }
            let n = Self::parse_bound_digits(&min_str, 0)?;
            if !self.cur.eat('}') {
                return Err(ParseError::InvalidBoundsSyntax);
            }
            Ok((n, n))
        }
    }

    fn parse_bound_digits(s: &str, default: u32) -> Result<u32, ParseError> {
        if s.is_empty() {
            Ok(default)
        } else {
            s.parse().map_err(|_| ParseError::InvalidBoundsSyntax)
        }
    }

    fn parse_digits(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.cur.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.cur.bump();
            } else {
                break;
            }
        }
        s
    }

    fn parse_atom(&mut self, flags: Flags) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        match self.cur.peek() {
            Some('[') => self.parse_brackets(),
            Some('(') => self.parse_group(flags),
            Some('\\') => self.parse_escape_atom(),
            Some('.') => {
                self.cur.bump();
                let class = if flags.contains(Flags::BINARY) { CClass::Any } else { CClass::Line };
                Ok(Ast::new(
                    AstKind::Class { class, neg: false, frontier: false },
                    Span { from: start, to: self.cur.byte_pos() },
                ))
            }
            Some('^') => {
                self.cur.bump();
                Ok(Ast::new(
                    AstKind::Class { class: CClass::Line, neg: false, frontier: true },
                    Span { from: start, to: self.cur.byte_pos() },
                ))
            }
            Some('$') => {
                self.cur.bump();
                Ok(Ast::new(
                    AstKind::Class { class: CClass::Line, neg: true, frontier: true },
                    Span { from: start, to: self.cur.byte_pos() },
                ))
            }
            Some(')') | None => Err(ParseError::UnexpectedEof),
            Some(c) => {
                self.cur.bump();
                Ok(Ast::new(
                    AstKind::Atom { codepoint: c, esc_kind: EscKind::None },
                    Span { from: start, to: self.cur.byte_pos() },
                ))
            }
        }
    }

    fn parse_escape_atom(&mut self) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        self.cur.bump(); // backslash
        let c = self.cur.peek().ok_or(ParseError::UnexpectedEof)?;
        if let Some((class, neg, frontier)) = escape_class(c) {
            self.cur.bump();
            let span = Span { from: start, to: self.cur.byte_pos() };
            return Ok(Ast::new(AstKind::Class { class, neg, frontier }, span));
        }
        let (codepoint, esc_kind) = self.parse_escape_rune()?;
        let span = Span { from: start, to: self.cur.byte_pos() };
        Ok(Ast::new(AstKind::Atom { codepoint, esc_kind }, span))
    }

    /// Parses one escape payload, assuming the leading backslash was
    /// already consumed. Shared between atom position and bracket ranges.
    fn parse_escape_rune(&mut self) -> Result<(char, EscKind), ParseError> {
        let c = self.cur.bump().ok_or(ParseError::UnexpectedEof)?;
        let substituted = match c {
            '0' => Some('\0'),
            'e' => Some('\u{1b}'),
            'f' => Some('\u{0c}'),
            't' => Some('\t'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            'v' => Some('\u{0b}'),
            _ => None,
        };
        if let Some(ch) = substituted {
            return Ok((ch, EscKind::Substituted));
        }
        match c {
            'x' if self.cur.peek() == Some('{') => {
                self.cur.bump();
                let hex = self.take_while_hex();
                if !self.cur.eat('}') {
                    return Err(ParseError::UnsupportedSyntax("unterminated \\x{...} escape"));
                }
                Ok((self.hex_to_char(&hex), EscKind::Substituted))
            }
            'x' => Ok((self.hex_to_char(&self.take_n_hex(2)), EscKind::Substituted)),
            'u' => Ok((self.hex_to_char(&self.take_n_hex(4)), EscKind::Substituted)),
            'U' => Ok((self.hex_to_char(&self.take_n_hex(8)), EscKind::Substituted)),
            other if other.is_alphanumeric() => {
                log::warn!("unrecognized escape '\\{other}', passing through literally");
                Ok((other, EscKind::Unrecognized))
            }
            other => Ok((other, EscKind::None)),
        }
    }

    fn take_n_hex(&mut self, n: usize) -> String {
        let mut s = String::new();
        for _ in 0..n {
            match self.cur.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    s.push(c);
                    self.cur.bump();
                }
                _ => break,
            }
        }
        s
    }

    fn take_while_hex(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.cur.peek() {
            if c.is_ascii_hexdigit() {
                s.push(c);
                self.cur.bump();
            } else {
                break;
            }
        }
        s
    }

    fn hex_to_char(&self, hex: &str) -> char {
        let value = u32::from_str_radix(hex, 16).unwrap_or(0);
        char::from_u32(value).unwrap_or_else(|| {
            log::warn!("invalid codepoint U+{value:x} in escape, substituting U+FFFD");
            char::REPLACEMENT_CHARACTER
        })
    }

    fn parse_brackets(&mut self) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        self.cur.bump(); // '['
        let negated = self.cur.eat('^');
        let mut children = Vec::new();
        loop {
            match self.cur.peek() {
                None => return Err(ParseError::UnterminatedBracket),
                Some(']') => break,
                _ => {}
            }
            if self.cur.peek() == Some('[') && self.cur.peek_at(1) == Some(':') {
                children.push(self.parse_named_class()?);
            } else {
                children.push(self.parse_bracket_range()?);
            }
        }
        self.cur.bump(); // ']'
        if children.is_empty() {
            return Err(ParseError::EmptyBrackets);
        }
        children.sort_by_key(|node| match &node.kind {
            AstKind::Range { min, .. } => *min as i32,
            _ => -1,
        });
        let span = Span { from: start, to: self.cur.byte_pos() };
        let node = Ast::new(AstKind::Brackets { children }, span);
        Ok(if negated { complement_brackets(node) } else { node })
    }

    fn parse_named_class(&mut self) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        self.cur.bump(); // '['
        self.cur.bump(); // ':'
        let neg = self.cur.eat('^');
        let mut name = String::new();
        while let Some(c) = self.cur.peek() {
            if c.is_ascii_alphabetic() {
                name.push(c);
                self.cur.bump();
            } else {
                break;
            }
        }
        if !(self.cur.eat(':') && self.cur.eat(']')) {
            return Err(ParseError::InvalidNamedClass(name));
        }
        let class = CClass::by_name(&name).ok_or(ParseError::InvalidNamedClass(name))?;
        let span = Span { from: start, to: self.cur.byte_pos() };
        Ok(Ast::new(AstKind::Class { class, neg, frontier: false }, span))
    }

    fn parse_bracket_range(&mut self) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        if self.cur.peek() == Some('\\') {
            let save = self.cur.idx;
            self.cur.bump();
            if let Some(c) = self.cur.peek() {
                if matches!(c, 'w' | 'W' | 'd' | 'D' | 's' | 'S') {
                    let (class, neg, _) = escape_class(c).unwrap();
                    self.cur.bump();
                    let span = Span { from: start, to: self.cur.byte_pos() };
                    return Ok(Ast::new(AstKind::Class { class, neg, frontier: false }, span));
                }
            }
            self.cur.idx = save;
        }
        let lo = self.parse_range_endpoint()?;
        if self.cur.peek() == Some('-') && self.cur.peek_at(1) != Some(']') && self.cur.peek_at(1).is_some() {
            self.cur.bump();
            let hi = self.parse_range_endpoint()?;
            let span = Span { from: start, to: self.cur.byte_pos() };
            let (min, max) = if lo <= hi {
                (lo, hi)
            } else {
                log::error!("invalid byte range {lo:#x}..={hi:#x} in bracket expression, swapping");
                (hi, lo)
            };
            Ok(Ast::new(AstKind::Range { min, max }, span))
        } else {
            let span = Span { from: start, to: self.cur.byte_pos() };
            Ok(Ast::new(AstKind::Range { min: lo, max: lo }, span))
        }
    }

    fn parse_range_endpoint(&mut self) -> Result<u8, ParseError> {
        let c = if self.cur.peek() == Some('\\') {
            self.cur.bump();
            self.parse_escape_rune()?.0
        } else {
            self.cur.bump().ok_or(ParseError::UnterminatedBracket)?
        };
        u8::try_from(c as u32).map_err(|_| {
            ParseError::UnsupportedSyntax("UTF-8 range expansion of bracket classes is not yet implemented")
        })
    }

    fn parse_group(&mut self, flags: Flags) -> Result<Ast, ParseError> {
        let start = self.cur.byte_pos();
        self.cur.bump(); // '('
        let mut inner_flags = flags;
        let mut is_flag_group = false;
        if self.cur.peek() == Some('?') {
            // Lookaround introducers (`(?=` `(?!` `(?<=` `(?<!`) are
            // recognized here and rejected rather than silently parsed as
            // a flag-adjustment group whose body happens to start with
            // those characters as literals — this grammar has no
            // lookaround (§9 Non-goals).
            let next = self.cur.peek_at(1);
            let is_lookaround = matches!(next, Some('=') | Some('!'))
                || (next == Some('<') && matches!(self.cur.peek_at(2), Some('=') | Some('!')));
            if is_lookaround {
                return Err(ParseError::UnsupportedSyntax("lookaround assertions are not supported"));
            }
        }
        if self.cur.eat('?') {
            is_flag_group = true;
            let (new_flags, consumed) = Flags::adj(self.cur.remaining(), flags, false);
            inner_flags = new_flags;
            for _ in 0..consumed {
                self.cur.bump();
            }
            self.cur.eat(':');
        }
        let body = self.parse_pattern(inner_flags)?;
        if !self.cur.eat(')') {
            return Err(ParseError::UnterminatedGroup);
        }
        if is_flag_group {
            return Ok(body);
        }
        // Explicit-captures mode: a group whose body is a bare alternation
        // stays non-capturing by default (see SPEC_FULL.md / DESIGN.md).
        if flags.contains(Flags::EXPLICIT_CAPTURES) && matches!(body.kind, AstKind::Alternation { .. }) {
            return Ok(body);
        }
        let index = self.next_capture;
        self.next_capture += 1;
        let span = Span { from: start, to: self.cur.byte_pos() };
        Ok(Ast::new(AstKind::Capture { index, child: Box::new(body) }, span))
    }
}

/// Complements a parsed `[^…]` over `[0, 255]`. Range children are merged
/// by interval complement; class-shortcut children (from `\d` etc. reused
/// inside brackets) complement by flipping their `neg` bit, since a
/// negated membership-of-a-negated-class is membership of the original
/// class. `original_source/nfa-compile.c` leaves a literal `UINT_MAX + 1`
/// TODO around the top of this computation; this clamps explicitly
/// instead of wrapping (§9 Design Notes).
fn complement_brackets(node: Ast) -> Ast {
    let span = node.span;
    let children = match node.kind {
        AstKind::Brackets { children } => children,
        other => return Ast::new(other, span),
    };
    let mut ranges: Vec<(u8, u8)> = Vec::new();
    let mut classes: Vec<Ast> = Vec::new();
    for child in children {
        match child.kind {
            AstKind::Range { min, max } => ranges.push((min, max)),
            AstKind::Class { class, neg, frontier } => {
                classes.push(Ast::new(AstKind::Class { class, neg: !neg, frontier }, child.span));
            }
            other => classes.push(Ast::new(other, child.span)),
        }
    }
    ranges.sort_unstable();
    let mut complemented = Vec::new();
    let mut next_lo: u32 = 0;
    for (lo, hi) in ranges {
        if u32::from(lo) > next_lo {
            complemented.push(Ast::new(AstKind::Range { min: next_lo as u8, max: (lo - 1) }, span));
        }
        next_lo = next_lo.max(u32::from(hi) + 1);
    }
    if next_lo <= 0xff {
        complemented.push(Ast::new(AstKind::Range { min: next_lo as u8, max: 0xff }, span));
    }
    complemented.extend(classes);
    Ast::new(AstKind::Brackets { children: complemented }, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn covered_bytes(ast: &Ast) -> HashSet<u8> {
        let mut set = HashSet::new();
        if let AstKind::Brackets { children } = &ast.kind {
            for child in children {
                if let AstKind::Range { min, max } = child.kind {
                    for b in min..=max {
                        set.insert(b);
                    }
                }
            }
        }
        set
    }

    #[test]
    fn bracket_complement_is_involutive_p7() {
        let (ast, _) = parse("[a-fP-Z]", Flags::NONE).unwrap();
        let branch = match ast.kind {
            AstKind::Branch { children } => children,
            _ => panic!("expected a branch"),
        };
        let brackets = &branch[0];
        let complemented = complement_brackets(Ast::new(
            AstKind::Brackets { children: match &brackets.kind {
                AstKind::Brackets { children } => children.clone(),
                _ => panic!("expected brackets"),
            } },
            brackets.span,
        ));
        let twice = complement_brackets(complemented.clone());
        assert_eq!(covered_bytes(&brackets), covered_bytes(&twice));
    }

    #[test]
    fn simple_literal_parses_to_branch_of_atoms() {
        let (ast, n_captures) = parse("asdf", Flags::NONE).unwrap();
        assert_eq!(n_captures, 0);
        match ast.kind {
            AstKind::Branch { children } => assert_eq!(children.len(), 4),
            other => panic!("expected Branch, got {other:?}"),
        }
    }

    #[test]
    fn capture_indices_assigned_in_lexical_order() {
        let (ast, n_captures) = parse("(a)(b(c))", Flags::NONE).unwrap();
        assert_eq!(n_captures, 3);
        let AstKind::Branch { children } = ast.kind else { panic!() };
        let AstKind::Capture { index: i0, .. } = children[0].kind else { panic!() };
        let AstKind::Capture { index: i1, .. } = children[1].kind else { panic!() };
        assert_eq!((i0, i1), (0, 1));
    }

    #[test]
    fn unterminated_bracket_is_an_error() {
        assert!(parse("invalid[", Flags::NONE).is_err());
    }

    #[test]
    fn named_class_resolves_to_cclass() {
        let (ast, _) = parse("[[:digit:]]", Flags::NONE).unwrap();
        let AstKind::Branch { children } = ast.kind else { panic!() };
        let AstKind::Brackets { children } = &children[0].kind else { panic!() };
        assert!(matches!(children[0].kind, AstKind::Class { class: CClass::Digit, neg: false, .. }));
    }

    #[test]
    fn bounded_repetition_parses_min_max() {
        let (ast, _) = parse("a{2,4}", Flags::NONE).unwrap();
        let AstKind::Branch { children } = ast.kind else { panic!() };
        assert!(matches!(children[0].kind, AstKind::Repeat { min: 2, max: 4, .. }));
    }

    #[test]
    fn reluctant_marker_is_recognized_syntactically() {
        let (ast, _) = parse("a*?", Flags::NONE).unwrap();
        let AstKind::Branch { children } = ast.kind else { panic!() };
        assert!(matches!(children[0].kind, AstKind::Repeat { reluctant: true, .. }));
    }

    #[test]
    fn literal_compiler_forces_one_atom_per_codepoint() {
        let ast = compile_literal("ab");
        let AstKind::Branch { children } = ast.kind else { panic!() };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn lookaround_syntax_is_rejected_not_silently_misparsed() {
        assert!(parse("(?=foo)", Flags::NONE).is_err());
        assert!(parse("(?!foo)", Flags::NONE).is_err());
        assert!(parse("(?<=foo)bar", Flags::NONE).is_err());
        assert!(parse("(?<!foo)bar", Flags::NONE).is_err());
    }
}
