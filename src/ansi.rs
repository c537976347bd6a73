//! Escape-sequence length recognition.
//!
//! Prompts may embed arbitrary terminal escape sequences; those occupy zero
//! display columns and must be skipped while measuring. This module answers
//! one question: how many bytes at the start of a string form a single
//! escape sequence?
//!
//! Recognition order, first match wins:
//!
//! 1. A sequence already registered in the [`LayoutCache`] prefix index.
//! 2. CSI sequences: `ESC [`, parameter bytes (0x30–0x3F), intermediate
//!    bytes (0x20–0x2F), one final byte (0x40–0x7E).
//! 3. OSC sequences: `ESC ]` up to BEL or ST (`ESC \`).
//! 4. screen/tmux title sequences: `ESC k` or `ESC Ptmux;` up to `ESC \`
//!    (tmux payloads double their escapes, so only an unpaired `ESC \`
//!    terminates).
//! 5. Two-byte sequences: ESC followed by a byte in 0x20–0x7E.
//! 6. A conservative fallback: any visual-attribute capability string that
//!    prefixes the input.
//!
//! Truncated CSI/OSC sequences are not recognized: the returned length
//! always covers one complete sequence.

use crate::cache::LayoutCache;
use crate::terminal::Capabilities;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Length in bytes of the escape sequence starting at `code`, or 0.
///
/// Pure with respect to the given cache contents and capability set.
pub fn escape_code_length(cache: &LayoutCache, caps: &Capabilities, code: &str) -> usize {
    if !code.as_bytes().first().is_some_and(|&b| b == ESC) {
        return 0;
    }
    let cached = cache.find_escape_code(code);
    if cached != 0 {
        return cached;
    }
    raw_escape_code_length(caps, code).unwrap_or(0)
}

/// Recognize a sequence without consulting the cache.
pub(crate) fn raw_escape_code_length(caps: &Capabilities, code: &str) -> Option<usize> {
    if code.as_bytes().first() != Some(&ESC) {
        return None;
    }
    csi_length(code)
        .or_else(|| osc_length(code))
        .or_else(|| screen_name_length(code))
        .or_else(|| two_byte_length(code))
        .or_else(|| capability_length(caps, code))
}

/// CSI: `ESC [` params/intermediates, then a final byte.
fn csi_length(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    if bytes.get(1) != Some(&b'[') {
        return None;
    }
    let mut i = 2;
    while i < bytes.len() && (0x20..=0x3f).contains(&bytes[i]) {
        i += 1;
    }
    if i < bytes.len() && (0x40..=0x7e).contains(&bytes[i]) {
        Some(i + 1)
    } else {
        None
    }
}

/// OSC: `ESC ]` up to BEL or ST.
fn osc_length(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    if bytes.get(1) != Some(&b']') {
        return None;
    }
    let mut i = 2;
    while i < bytes.len() {
        if bytes[i] == BEL {
            return Some(i + 1);
        }
        if bytes[i] == b'\\' && bytes[i - 1] == ESC {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// screen title (`ESC k`) and tmux passthrough (`ESC Ptmux;`) sequences,
/// both terminated by `ESC \`.
fn screen_name_length(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    let is_tmux = code[1..].starts_with("Ptmux;");
    if bytes.get(1) != Some(&b'k') && !is_tmux {
        return None;
    }
    let mut offset = 2;
    loop {
        let Some(pos) = find_st(bytes, offset) else {
            // Unterminated: treat the two-byte introducer as the sequence.
            return Some(2);
        };
        if is_tmux {
            // Escapes inside a tmux payload are doubled; an odd run of
            // preceding ESC bytes means this `ESC \` belongs to the payload.
            let mut esc_run = 0;
            let mut i = pos;
            while i > 0 && bytes[i - 1] == ESC {
                i -= 1;
                if i > 0 {
                    esc_run += 1;
                }
            }
            if esc_run % 2 == 1 {
                offset = pos + 1;
                continue;
            }
        }
        return Some(pos + 2);
    }
}

/// Position of the next `ESC \` at or after `from`.
fn find_st(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == ESC && bytes[i + 1] == b'\\' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// ESC plus a single printable byte (not a CSI/OSC introducer).
fn two_byte_length(code: &str) -> Option<usize> {
    match code.as_bytes().get(1) {
        Some(&b) if (0x20..=0x7e).contains(&b) && b != b'[' && b != b']' => Some(2),
        _ => None,
    }
}

/// A visual-attribute capability string prefixing the input.
fn capability_length(caps: &Capabilities, code: &str) -> Option<usize> {
    caps.visual_attribute_caps()
        .into_iter()
        .flatten()
        .find(|cap| !cap.is_empty() && code.starts_with(cap))
        .map(str::len)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn len(code: &str) -> usize {
        let cache = LayoutCache::new();
        escape_code_length(&cache, &Capabilities::xterm_256color(), code)
    }

    #[test]
    fn plain_text_is_not_an_escape() {
        assert_eq!(len("hi"), 0);
        assert_eq!(len(""), 0);
        assert_eq!(len("a\x1b[31m"), 0);
    }

    #[test]
    fn sgr_color_sequence() {
        assert_eq!(len("\x1b[31mhi"), 5);
        assert_eq!(len("\x1b[38;5;196mx"), 11);
    }

    #[test]
    fn csi_with_intermediate_bytes() {
        // DECSCUSR uses an intermediate space byte.
        assert_eq!(len("\x1b[2 q"), 5);
    }

    #[test]
    fn truncated_csi_is_rejected() {
        assert_eq!(len("\x1b[31"), 0);
        assert_eq!(len("\x1b["), 0);
    }

    #[test]
    fn osc_terminated_by_bel() {
        assert_eq!(len("\x1b]0;title\x07rest"), 10);
    }

    #[test]
    fn osc_terminated_by_st() {
        assert_eq!(len("\x1b]0;title\x1b\\rest"), 11);
    }

    #[test]
    fn unterminated_osc_is_rejected() {
        assert_eq!(len("\x1b]0;title"), 0);
    }

    #[test]
    fn screen_title_sequence() {
        assert_eq!(len("\x1bkname\x1b\\after"), 8);
        // Unterminated: only the introducer is consumed.
        assert_eq!(len("\x1bkname"), 2);
    }

    #[test]
    fn tmux_passthrough_skips_doubled_escapes() {
        // The payload's `ESC ESC \` must not terminate the sequence.
        let code = "\x1bPtmux;\x1b\x1b\\\x1b\\rest";
        assert_eq!(len(code), code.len() - "rest".len());
    }

    #[test]
    fn two_byte_sequence() {
        assert_eq!(len("\x1b7rest"), 2); // DECSC
        assert_eq!(len("\x1b="), 2);
    }

    #[test]
    fn esc_followed_by_control_is_rejected() {
        assert_eq!(len("\x1b\x01"), 0);
    }

    #[test]
    fn cache_hit_takes_precedence() {
        let mut cache = LayoutCache::new();
        let caps = Capabilities::xterm_256color();
        cache.add_escape_code("\x1b]0;title\x07".to_owned());
        assert_eq!(escape_code_length(&cache, &caps, "\x1b]0;title\x07rest"), 10);
    }
}
