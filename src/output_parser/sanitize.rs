//! Narrow cleanup of JSON-ish model output.
//!
//! Models wrap JSON in Markdown fences, emit `TRUE`/`NULL` style literals and
//! leave trailing commas. [`sanitize`] fixes exactly those three habits and
//! nothing else; it is not a relaxed-JSON grammar. All rewrites are manual
//! character scans, no regex.

/// Clean model output so that it has a better chance of parsing as JSON.
///
/// One pass:
/// 1. Remove fence markers: a run of 3+ backticks, an optional `json` tag,
///    and the whitespace after it.
/// 2. Trim, strip trailing backticks, trim again.
/// 3. Lower-case `NULL`, `TRUE`, `FALSE` (any case) that follow a `:`
///    outside double-quoted strings.
/// 4. Drop commas directly before `}` or `]` outside strings.
///
/// Passes repeat until the text stops changing, so the function is
/// idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
///
/// # Examples
///
/// ```
/// use prompt_engine::output_parser::sanitize;
///
/// let raw = "```json\n{\"a\": TRUE, \"b\": NULL,}\n```";
/// assert_eq!(sanitize(raw), "{\"a\": true, \"b\": null}");
/// ```
pub fn sanitize(text: &str) -> String {
    let mut current = sanitize_pass(text);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_pass(text: &str) -> String {
    let unfenced = strip_fences(text);
    let trimmed = unfenced.trim().trim_end_matches('`').trim();
    let literals = lowercase_literals(trimmed);
    remove_trailing_commas(&literals)
}

/// Remove every fence marker. Not string-aware: a fence is never valid JSON.
fn strip_fences(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(s.len());
    let mut i = 0;

    while i < len {
        if chars[i] != '`' {
            result.push(chars[i]);
            i += 1;
            continue;
        }

        let mut run_end = i;
        while run_end < len && chars[run_end] == '`' {
            run_end += 1;
        }
        if run_end - i < 3 {
            result.extend(&chars[i..run_end]);
            i = run_end;
            continue;
        }

        i = run_end;
        if matches_word_ci(&chars, i, "json") {
            i += 4;
        }
        while i < len && chars[i].is_whitespace() {
            i += 1;
        }
    }
    result
}

const LITERALS: [&str; 3] = ["null", "true", "false"];

/// Lower-case JSON literals written in the wrong case after a colon.
fn lowercase_literals(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(s.len());
    let mut i = 0;
    let mut in_string = false;
    let mut escape_next = false;

    while i < len {
        let ch = chars[i];
        if escape_next {
            escape_next = false;
            result.push(ch);
            i += 1;
            continue;
        }
        if in_string {
            if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            result.push(ch);
            i += 1;
            continue;
        }
        if ch == '"' {
            in_string = true;
            result.push(ch);
            i += 1;
            continue;
        }

        result.push(ch);
        i += 1;
        if ch != ':' {
            continue;
        }

        let mut j = i;
        while j < len && chars[j].is_whitespace() {
            j += 1;
        }
        if let Some(word) = LITERALS.iter().find(|w| matches_word_ci(&chars, j, w)) {
            result.extend(&chars[i..j]);
            result.push_str(word);
            i = j + word.len();
        }
    }
    result
}

/// Case-insensitive match of `word` at `i`, followed by a word boundary.
fn matches_word_ci(chars: &[char], i: usize, word: &str) -> bool {
    let n = word.len();
    if i + n > chars.len() {
        return false;
    }
    let matched = chars[i..i + n]
        .iter()
        .zip(word.chars())
        .all(|(a, b)| a.eq_ignore_ascii_case(&b));
    let boundary = chars
        .get(i + n)
        .map_or(true, |c| !(c.is_alphanumeric() || *c == '_'));
    matched && boundary
}

/// Remove trailing commas before `}` or `]`.
fn remove_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape_next = false;

    for i in 0..len {
        let ch = chars[i];
        if escape_next {
            escape_next = false;
            result.push(ch);
            continue;
        }
        if in_string {
            if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            result.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = true;
            result.push(ch);
            continue;
        }
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        result.push(ch);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_literals_and_trailing_comma() {
        let raw = "```json\n{\"a\": TRUE, \"b\": NULL,}\n```";
        let cleaned = sanitize(raw);
        let value: serde_json::Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(value, json!({"a": true, "b": null}));
    }

    #[test]
    fn test_idempotent_on_tricky_inputs() {
        let inputs = [
            "",
            "plain text",
            "```json\n{\"a\": TRUE, \"b\": NULL,}\n```",
            "````\n[1, 2, ,]\n````",
            "{\"a\": 1,```\n}",
            "{\"k\": \"text: TRUE,}\"}",
            "{\"x\":False , \"y\":[1,2,],}",
            "```JSON{\"n\": Null}```",
            "``` ```",
            "`a` {\"b\": `c`}``",
            "{\"s\": \"escaped \\\" : TRUE\",}",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_literals_inside_strings_untouched() {
        let raw = r#"{"note": "value: TRUE, and NULL", "ok": FALSE}"#;
        assert_eq!(
            sanitize(raw),
            r#"{"note": "value: TRUE, and NULL", "ok": false}"#
        );
    }

    #[test]
    fn test_literal_requires_word_boundary() {
        assert_eq!(sanitize(r#"{"a": TRUELY}"#), r#"{"a": TRUELY}"#);
        assert_eq!(sanitize(r#"{"a": null_ish}"#), r#"{"a": null_ish}"#);
    }

    #[test]
    fn test_literal_only_after_colon() {
        assert_eq!(sanitize("[TRUE, NULL]"), "[TRUE, NULL]");
    }

    #[test]
    fn test_trailing_commas_with_whitespace() {
        assert_eq!(sanitize("[1, 2 ,\n ]"), "[1, 2 \n ]");
        assert_eq!(sanitize(r#"{"a": "x,}",}"#), r#"{"a": "x,}"}"#);
    }

    #[test]
    fn test_fence_removal_exposes_second_pass_comma() {
        let cleaned = sanitize("{\"a\": 1,```\n}");
        assert_eq!(cleaned, "{\"a\": 1}");
    }

    #[test]
    fn test_short_backtick_runs_kept_until_the_end() {
        assert_eq!(sanitize("`code` here"), "`code` here");
        assert_eq!(sanitize("answer``"), "answer");
    }
}
