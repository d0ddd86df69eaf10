use once_cell::sync::Lazy;
use regex::Regex;

/// Manual arrangement requested through a group title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutToken {
    /// One row, sorted by x then y.
    Horizontal,
    /// One column, sorted by y then x.
    Vertical,
    /// `k` rows filled column by column.
    Rows(usize),
    /// `k` columns filled row by row.
    Columns(usize),
}

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(HORIZONTAL|VERTICAL|([1-9])(ROW|COL))\]").unwrap());

/// First layout token found in `title`, if any.
pub fn parse_token(title: &str) -> Option<LayoutToken> {
    let caps = TOKEN_RE.captures(title)?;
    let word = caps.get(1)?.as_str();
    if word.eq_ignore_ascii_case("horizontal") {
        return Some(LayoutToken::Horizontal);
    }
    if word.eq_ignore_ascii_case("vertical") {
        return Some(LayoutToken::Vertical);
    }
    let count: usize = caps.get(2)?.as_str().parse().ok()?;
    let rows = caps.get(3)?.as_str().eq_ignore_ascii_case("row");
    Some(match (rows, count) {
        (true, 1) => LayoutToken::Horizontal,
        (false, 1) => LayoutToken::Vertical,
        (true, k) => LayoutToken::Rows(k),
        (false, k) => LayoutToken::Columns(k),
    })
}
