//! Markdown escape cleanup.
//!
//! The rich-text editor's markdown serializer escapes structural characters
//! (`\*`, `\[`, `\_`, ...) even where the author typed them as
//! plain text. Writing that output back to disk would litter the file with
//! backslashes on every autosave, so it is normalized first.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Stand-in for a literal `\\` while escapes are being stripped.
///
/// A private-use code point, so it never collides with text an author
/// could reasonably type.
const BACKSLASH_PLACEHOLDER: char = '\u{E000}';

/// A single backslash followed by one of the characters the serializer
/// over-escapes: brackets, parentheses, emphasis markers, backticks, header
/// hashes, table pipes, strikethrough tildes, angle brackets and braces.
static OVER_ESCAPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([\[\]()*_`#|~<>{}])").expect("valid escape pattern"));

/// Remove over-escaping introduced by the markdown serializer.
///
/// Literal double backslashes survive unchanged. The transform is idempotent:
/// `normalize(&normalize(x)) == normalize(x)`. If the input cannot be processed
/// safely it is returned as-is rather than risk losing content.
pub fn normalize(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }

    if text.contains(BACKSLASH_PLACEHOLDER) {
        warn!("Skipping escape cleanup: text contains the reserved placeholder character");
        return text.to_string();
    }

    let placeholder = BACKSLASH_PLACEHOLDER.to_string();
    let protected = text.replace("\\\\", &placeholder);
    let unescaped = OVER_ESCAPED.replace_all(&protected, "$1");
    unescaped.replace(BACKSLASH_PLACEHOLDER, "\\\\")
}
