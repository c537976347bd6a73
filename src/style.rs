//! Highlight style tokens attached to screen cells.
//!
//! A [`Style`] is what the host's syntax highlighter hands us for every
//! character of the command line. The renderer never interprets a style
//! while diffing; two cells are "equal" exactly when their characters and
//! styles are equal. Only at emission time is a style decoded into the
//! capability strings that realize it on the terminal.

use std::fmt;

bitflags::bitflags! {
    /// Text attribute flags carried by a [`Style`].
    #[repr(transparent)]
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Attr: u8 {
        /// Bold text.
        const BOLD      = 0b0000_0001;
        /// Dimmed/faint text.
        const DIM       = 0b0000_0010;
        /// Italic text.
        const ITALIC    = 0b0000_0100;
        /// Underlined text.
        const UNDERLINE = 0b0000_1000;
        /// Reverse video.
        const REVERSE   = 0b0001_0000;
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// A per-cell highlight token: optional palette colors plus attributes.
///
/// Packed into four bytes so grids of styled cells stay compact. Equality is
/// field-wise; the diff pass relies on nothing else.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    fg: PaletteColor,
    bg: PaletteColor,
    attrs: Attr,
}

/// A palette index in 0..=255, or the terminal default.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
struct PaletteColor(Option<u8>);

impl Style {
    /// The default style: default colors, no attributes.
    pub const fn plain() -> Self {
        Self {
            fg: PaletteColor(None),
            bg: PaletteColor(None),
            attrs: Attr::empty(),
        }
    }

    /// Set the foreground palette index.
    #[must_use]
    pub const fn with_fg(mut self, index: u8) -> Self {
        self.fg = PaletteColor(Some(index));
        self
    }

    /// Set the background palette index.
    #[must_use]
    pub const fn with_bg(mut self, index: u8) -> Self {
        self.bg = PaletteColor(Some(index));
        self
    }

    /// Set the attribute flags.
    #[must_use]
    pub const fn with_attrs(mut self, attrs: Attr) -> Self {
        self.attrs = attrs;
        self
    }

    /// The foreground palette index, if not the terminal default.
    pub const fn fg(&self) -> Option<u8> {
        self.fg.0
    }

    /// The background palette index, if not the terminal default.
    pub const fn bg(&self) -> Option<u8> {
        self.bg.0
    }

    /// The attribute flags.
    pub const fn attrs(&self) -> Attr {
        self.attrs
    }

    /// Whether this is the default style.
    pub fn is_plain(&self) -> bool {
        *self == Self::plain()
    }
}

impl fmt::Debug for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Style")
            .field("fg", &self.fg.0)
            .field("bg", &self.bg.0)
            .field("attrs", &self.attrs)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn style_is_4_bytes() {
        assert_eq!(std::mem::size_of::<Style>(), 4);
    }

    #[test]
    fn plain_style_has_no_color_or_attrs() {
        let s = Style::plain();
        assert_eq!(s.fg(), None);
        assert_eq!(s.bg(), None);
        assert!(s.attrs().is_empty());
        assert!(s.is_plain());
    }

    #[test]
    fn builder_round_trips() {
        let s = Style::plain()
            .with_fg(1)
            .with_bg(237)
            .with_attrs(Attr::BOLD | Attr::UNDERLINE);
        assert_eq!(s.fg(), Some(1));
        assert_eq!(s.bg(), Some(237));
        assert!(s.attrs().contains(Attr::BOLD));
        assert!(s.attrs().contains(Attr::UNDERLINE));
        assert!(!s.attrs().contains(Attr::REVERSE));
        assert!(!s.is_plain());
    }

    #[test]
    fn equality_is_field_wise() {
        assert_eq!(Style::plain().with_fg(3), Style::plain().with_fg(3));
        assert_ne!(Style::plain().with_fg(3), Style::plain().with_fg(4));
        assert_ne!(
            Style::plain().with_attrs(Attr::BOLD),
            Style::plain().with_attrs(Attr::DIM)
        );
    }
}
