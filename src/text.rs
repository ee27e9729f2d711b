//! Width-bounded text truncation.
//!
//! Widths are terminal columns: wide CJK characters count as two, and
//! truncation never splits a grapheme cluster.

use std::borrow::Cow;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width of `text` in columns.
#[inline]
pub fn display_width(text: &str) -> usize {
    text.width()
}

/// Shorten `text` to fit in `max_width` columns, ending with `footer`.
///
/// Text that already fits is returned unchanged. Otherwise trailing
/// grapheme clusters are dropped until the rest fits next to `footer`.
/// If `footer` alone is wider than `max_width`, the result is `footer`.
///
/// ```rust,ignore
/// assert_eq!(compact_string("streaming tokens", "...", 10), "streami...");
/// ```
pub fn compact_string<'a>(text: &'a str, footer: &str, max_width: usize) -> Cow<'a, str> {
    if display_width(text) <= max_width {
        return Cow::Borrowed(text);
    }

    let budget = max_width.saturating_sub(display_width(footer));
    let mut used = 0;
    let mut cut = 0;
    for (offset, grapheme) in text.grapheme_indices(true) {
        let width = grapheme.width();
        if used + width > budget {
            break;
        }
        used += width;
        cut = offset + grapheme.len();
    }

    let mut result = String::with_capacity(cut + footer.len());
    result.push_str(&text[..cut]);
    result.push_str(footer);
    Cow::Owned(result)
}
