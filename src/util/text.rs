use once_cell::sync::Lazy;
use regex::Regex;

/// Matches anything shaped like a markup tag: `<`, the shortest run of
/// characters up to the next `>`, then `>`. Nested tags are not understood.
static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<.*?>").expect("tag pattern is a valid regex"));

/// Removes markup tags from feed-supplied text and trims the result.
///
/// Every `<...>` run is deleted. HTML entities such as `&amp;` are left as
/// they are. Text without tags is only trimmed, so applying this twice gives
/// the same result as applying it once.
///
/// # Examples
///
/// ```
/// use feedfold::util::strip_tags;
///
/// assert_eq!(strip_tags("  <p>Hello <b>world</b></p>\n"), "Hello world");
/// assert_eq!(strip_tags("Tom &amp; Jerry"), "Tom &amp; Jerry");
/// ```
pub fn strip_tags(s: &str) -> String {
    TAG_PATTERN.replace_all(s, "").trim().to_string()
}
