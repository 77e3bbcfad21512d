//! Code-fence stripping
//!
//! Chat models like to wrap documents in Markdown fences. Strip one opener
//! at the very start and one closer at the very end; anything else is left
//! exactly as it was.

use std::sync::LazyLock;

use regex::Regex;

/// Opening fence line with an optional language tag, at the start of the text
static FENCE_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```(?:\w+)?\s*\n").expect("valid fence opener pattern"));

/// Closing fence at the end of the text
static FENCE_CLOSER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n```+\s*$").expect("valid fence closer pattern"));

/// Remove a single wrapping code fence, if present.
///
/// Opener and closer are matched independently, so a reply cut off before
/// its closing fence still loses the opener.
pub fn strip_code_fence(raw: &str) -> String {
    let without_opener = FENCE_OPENER.replace(raw, "");
    FENCE_CLOSER.replace(&without_opener, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfenced_text_unchanged() {
        let html = "<!DOCTYPE html>\n<html><body>hi</body></html>\n";
        assert_eq!(strip_code_fence(html), html);
        assert_eq!(strip_code_fence(""), "");
    }

    #[test]
    fn test_strips_fence_with_language() {
        assert_eq!(strip_code_fence("```html\n<p>x</p>\n```"), "<p>x</p>");
    }

    #[test]
    fn test_strips_bare_fence_and_surrounding_whitespace() {
        assert_eq!(strip_code_fence("\n  ```\n<p>x</p>\n```\n\n"), "<p>x</p>");
    }

    #[test]
    fn test_one_sided_fences() {
        assert_eq!(strip_code_fence("```html\n<p>x</p>"), "<p>x</p>");
        assert_eq!(strip_code_fence("<p>x</p>\n```"), "<p>x</p>");
    }

    #[test]
    fn test_only_outer_fence_removed() {
        let raw = "```markdown\nintro\n```js\nlet a = 1;\n```\noutro\n```";
        assert_eq!(strip_code_fence(raw), "intro\n```js\nlet a = 1;\n```\noutro");
    }

    #[test]
    fn test_non_matching_fences_left_alone() {
        // language tags with punctuation are not stripped
        assert_eq!(strip_code_fence("```c++\nint x;\n```"), "```c++\nint x;");
        // inline fences in the middle are content
        let raw = "<pre>```</pre>\n<p>after</p>";
        assert_eq!(strip_code_fence(raw), raw);
        assert_eq!(strip_code_fence("```"), "```");
    }
}
