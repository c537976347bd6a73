//! Byte-batching output with lazy style emission.
//!
//! Every byte the renderer produces lands in this buffer; the host's writer
//! sees a single `write_all` + `flush` per render. Style changes are
//! tracked so attribute and color sequences are emitted only when a cell's
//! style differs from the last one sent to the terminal.

use std::io::{self, Write};

use crate::style::{Attr, Style};
use crate::terminal::{expand, Capabilities};

/// Buffered renderer output.
#[derive(Default)]
pub struct Output {
    buf: Vec<u8>,
    /// Style the terminal is currently in, as far as we have told it.
    /// `None` means unknown (start of time, or after a failed flush).
    last_style: Option<Style>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn push_char(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.push_str(c.encode_utf8(&mut utf8));
    }

    /// Append a capability string if present; reports whether it was.
    pub fn tputs_if_some(&mut self, cap: Option<&str>) -> bool {
        match cap {
            Some(s) => {
                self.push_str(s);
                true
            }
            None => false,
        }
    }

    /// Append a parameterized capability expanded against `params`.
    pub fn tparm_if_some(&mut self, cap: Option<&str>, params: &[usize]) -> bool {
        match cap.and_then(|t| expand(t, params)) {
            Some(s) => {
                self.push_str(&s);
                true
            }
            None => false,
        }
    }

    /// Bring the terminal into `style`, emitting as little as possible.
    ///
    /// Dropping an attribute or returning a color to the default requires
    /// `exit_attribute_mode` followed by a full re-entry; adding attributes
    /// or changing a color emits only the difference.
    pub fn set_style(&mut self, caps: &Capabilities, style: Style) {
        if self.last_style == Some(style) {
            return;
        }

        let needs_reset = match self.last_style {
            None => true,
            Some(prev) => {
                prev.attrs().intersects(!style.attrs())
                    || (prev.fg().is_some() && style.fg().is_none())
                    || (prev.bg().is_some() && style.bg().is_none())
            }
        };
        let base = if needs_reset {
            self.tputs_if_some(caps.exit_attribute_mode.as_deref());
            Style::plain()
        } else {
            self.last_style.unwrap_or_else(Style::plain)
        };

        let missing = style.attrs() - base.attrs();
        if missing.contains(Attr::BOLD) {
            self.tputs_if_some(caps.enter_bold_mode.as_deref());
        }
        if missing.contains(Attr::DIM) {
            self.tputs_if_some(caps.enter_dim_mode.as_deref());
        }
        if missing.contains(Attr::ITALIC) {
            self.tputs_if_some(caps.enter_italics_mode.as_deref());
        }
        if missing.contains(Attr::UNDERLINE) {
            self.tputs_if_some(caps.enter_underline_mode.as_deref());
        }
        if missing.contains(Attr::REVERSE) {
            self.tputs_if_some(caps.enter_reverse_mode.as_deref());
        }
        if let Some(fg) = style.fg() {
            if base.fg() != Some(fg) {
                self.tparm_if_some(caps.set_a_foreground.as_deref(), &[usize::from(fg)]);
            }
        }
        if let Some(bg) = style.bg() {
            if base.bg() != Some(bg) {
                self.tparm_if_some(caps.set_a_background.as_deref(), &[usize::from(bg)]);
            }
        }

        self.last_style = Some(style);
    }

    /// Return the terminal to the default style.
    pub fn reset_style(&mut self, caps: &Capabilities) {
        self.set_style(caps, Style::plain());
    }

    /// Forget what style the terminal is in; the next `set_style` emits in
    /// full.
    pub fn invalidate_style(&mut self) {
        self.last_style = None;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Hand the buffered bytes to the host writer and flush it.
    ///
    /// On success the buffer is emptied. On failure the buffer is also
    /// dropped (the bytes may be partially written and are no longer
    /// trustworthy) and the tracked style is invalidated.
    pub fn flush_to<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        let result = sink.write_all(&self.buf).and_then(|()| sink.flush());
        self.buf.clear();
        if result.is_err() {
            self.last_style = None;
        }
        result
    }
}
