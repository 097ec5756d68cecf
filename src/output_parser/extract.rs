//! Bracket-span extraction.

/// Locate the JSON candidate inside free-form text.
///
/// Prefers the widest object span (first `{` to last `}`); falls back to
/// the widest array span (first `[` to last `]`). Returns `None` when
/// neither delimiter pair appears in order.
///
/// # Examples
///
/// ```
/// use prompt_engine::output_parser::json_span;
///
/// assert_eq!(json_span("Sure! {\"a\": [1]} Done."), Some("{\"a\": [1]}"));
/// assert_eq!(json_span("List: [1, 2]"), Some("[1, 2]"));
/// assert_eq!(json_span("} backwards {"), None);
/// ```
pub fn json_span(text: &str) -> Option<&str> {
    span_between(text, '{', '}').or_else(|| span_between(text, '[', ']'))
}

/// Array-first variant, used when an object span failed to parse.
pub(crate) fn array_span(text: &str) -> Option<&str> {
    span_between(text, '[', ']')
}

fn span_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end > start {
        Some(&text[start..end + close.len_utf8()])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_span_is_widest() {
        let text = r#"a {"x": {"y": 1}} b {"z": 2} c"#;
        assert_eq!(json_span(text), Some(r#"{"x": {"y": 1}} b {"z": 2}"#));
    }

    #[test]
    fn test_array_fallback() {
        assert_eq!(json_span("scores: [3, 4]"), Some("[3, 4]"));
    }

    #[test]
    fn test_unbalanced_object_falls_back_to_array() {
        assert_eq!(json_span("{ oops [1] "), Some("[1]"));
    }

    #[test]
    fn test_no_span() {
        assert_eq!(json_span("nothing here"), None);
        assert_eq!(json_span("{"), None);
        assert_eq!(array_span("]["), None);
    }

    #[test]
    fn test_array_of_objects() {
        let text = r#"[{"a": 1}, {"b": 2}]"#;
        assert_eq!(json_span(text), Some(r#"{"a": 1}, {"b": 2}"#));
        assert_eq!(array_span(text), Some(text));
    }
}
