use unicode_width::UnicodeWidthStr;

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.6;
const LINE_HEIGHT_RATIO: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSize {
    pub width: f64,
    pub height: f64,
}

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Estimated pixel extent of a single line of text. Wide (CJK) glyphs
/// count as two columns.
pub fn measure(s: &str, font_size: f64) -> TextSize {
    TextSize {
        width: display_width(s) as f64 * font_size * CHAR_WIDTH_RATIO,
        height: font_size * LINE_HEIGHT_RATIO,
    }
}

/// `Map~K, V~` is shown as `Map<K, V>`; an unmatched trailing `~` is closed.
pub fn display_type(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open = false;
    for ch in text.chars() {
        if ch == '~' {
            out.push(if open { '>' } else { '<' });
            open = !open;
        } else {
            out.push(ch);
        }
    }
    if open {
        out.push('>');
    }
    out
}
