//! Display-width rules for screen cells.
//!
//! Widths are 0 for combining marks and controls, 2 for East-Asian wide and
//! fullwidth characters, and 1 otherwise. Tabs and newlines never reach a
//! cell; the layout pass consumes them before characters are stored.

use unicode_width::UnicodeWidthChar;

/// Display width of a character: 0, 1 or 2.
pub fn char_width(c: char) -> usize {
    match c.width() {
        None => 0,
        Some(w) => w.min(2),
    }
}

/// Map a C0 control character to its Unicode control-picture glyph.
///
/// Stray controls inside a command line would otherwise move the cursor in
/// ways the diff pass cannot model. `\n` and `\r` are handled by the layout
/// pass before this applies.
pub fn rendered_char(c: char) -> char {
    if c < '\x20' {
        // U+2400..U+241F mirror the C0 block.
        char::from_u32(0x2400 + u32::from(c)).unwrap_or(char::REPLACEMENT_CHARACTER)
    } else {
        c
    }
}

/// Width of a character after control-picture substitution.
pub fn rendered_width(c: char) -> usize {
    char_width(rendered_char(c))
}
