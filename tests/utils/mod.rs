use gregex::Regex;
use regex as rust_regex;

/// Compiles `pattern` with gregex's single engine. Returns `None` if it was
/// rejected — the caller usually wants to assert this matches whether the
/// `regex` crate accepted the same text.
pub fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

/// Differentially tests `pattern` against `input` on both gregex and the
/// `regex` crate. Only call this with patterns inside the intersection of
/// both grammars — plain ASCII literals, bracket classes, bounded/unbounded
/// repetition, and alternation — since gregex's `d`/`c`/`b` flags, POSIX
/// named classes, and frontier escapes (`\<` `\>` `\A` `\z`, and also `^`/`$`,
/// which fire after every newline by default here rather than only at
/// true start/end of haystack like the `regex` crate's non-multiline `^`/`$`)
/// have no equivalent in the `regex` crate's syntax. Capture-group numbering
/// also differs (gregex has no implicit whole-match group 0), so only
/// whole-match spans are compared here; capture spans get their own
/// hand-written tests in `many_tests.rs`.
pub fn check_all_engines(pattern: &str, input: &str) {
    let rust = rust_regex::Regex::new(pattern);
    let ours = compile(pattern);

    match (rust, ours) {
        (Ok(rust_re), Some(engine)) => {
            let rust_match = rust_re.find(input).map(|m| (m.start(), m.end()));
            let my_match = engine.find(input).map(|m| (m.span.from, m.span.to));
            assert_eq!(my_match, rust_match, "Mismatch for pattern {pattern:?} input {input:?} (find)");

            let rust_all: Vec<_> = rust_re.find_iter(input).map(|m| (m.start(), m.end())).collect();
            let my_all: Vec<_> = engine.find_all(input).map(|m| (m.span.from, m.span.to)).collect();
            assert_eq!(my_all, rust_all, "Mismatch for pattern {pattern:?} input {input:?} (find_all)");
        }
        (Err(_), None) => {}
        (Ok(_), None) => panic!("gregex rejected a pattern the regex crate accepted: {pattern:?}"),
        (Err(e), Some(_)) => panic!("gregex accepted a pattern the regex crate rejected: {pattern:?} ({e})"),
    }
}
