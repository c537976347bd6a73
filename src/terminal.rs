//! The terminal-capability contract.
//!
//! The renderer never talks to a terminfo database. The host hands it a
//! [`Capabilities`] value holding the handful of control strings and boolean
//! flags the diff pass needs. A missing string disables the dependent
//! optimization path; it is never an error.
//!
//! Parameterized capabilities (`cursor_address`, `set_a_foreground`,
//! `parm_left_cursor`, ...) are terminfo-style templates. Only the small
//! subset of `tparm` codes those strings actually use is expanded: `%%`,
//! `%i`, `%pN`, `%d`. A template using anything else fails to expand, which
//! disables its path like a missing capability would.

/// Terminal capability strings and flags consumed by the renderer.
///
/// Field names follow terminfo. All strings are optional; `None` disables
/// whatever the string would have enabled.
#[derive(Clone, Debug, Default)]
pub struct Capabilities {
    /// Writing into the last column wraps the cursor to the next line.
    pub auto_right_margin: bool,
    /// The wrap after the last column is deferred until the next character
    /// (the xterm "newline glitch" behavior).
    pub eat_newline_glitch: bool,

    /// Absolute cursor addressing, e.g. `\x1b[%i%p1%d;%p2%dH` (row, column).
    pub cursor_address: Option<String>,
    /// Single-step cursor motions.
    pub cursor_up: Option<String>,
    pub cursor_down: Option<String>,
    pub cursor_left: Option<String>,
    pub cursor_right: Option<String>,
    /// Parameterized multi-step motions, e.g. `\x1b[%p1%dD`.
    pub parm_left_cursor: Option<String>,
    pub parm_right_cursor: Option<String>,

    /// Clear from the cursor to the end of the line.
    pub clr_eol: Option<String>,
    /// Clear from the cursor to the end of the screen.
    pub clr_eos: Option<String>,
    /// Clear the whole screen and home the cursor.
    pub clear_screen: Option<String>,
    /// Carriage return.
    pub carriage_return: Option<String>,

    /// Attribute entry/exit strings.
    pub enter_bold_mode: Option<String>,
    pub enter_dim_mode: Option<String>,
    pub enter_italics_mode: Option<String>,
    pub exit_italics_mode: Option<String>,
    pub enter_underline_mode: Option<String>,
    pub exit_underline_mode: Option<String>,
    pub enter_reverse_mode: Option<String>,
    /// Exit all attribute modes.
    pub exit_attribute_mode: Option<String>,

    /// Parameterized palette colors, e.g. `\x1b[38;5;%p1%dm`.
    pub set_a_foreground: Option<String>,
    pub set_a_background: Option<String>,

    /// Tab stop interval, if the terminal declares one.
    pub init_tabs: Option<usize>,
    /// Number of palette colors.
    pub max_colors: Option<usize>,
}

impl Capabilities {
    /// A capability set matching a stock `xterm-256color` entry.
    ///
    /// Hosts that already queried terminfo should build their own value;
    /// this constructor exists for tests and for hosts that are happy to
    /// assume an xterm-compatible terminal.
    pub fn xterm_256color() -> Self {
        Self {
            auto_right_margin: true,
            eat_newline_glitch: true,
            cursor_address: Some("\x1b[%i%p1%d;%p2%dH".to_owned()),
            cursor_up: Some("\x1b[A".to_owned()),
            cursor_down: Some("\n".to_owned()),
            cursor_left: Some("\x08".to_owned()),
            cursor_right: Some("\x1b[C".to_owned()),
            parm_left_cursor: Some("\x1b[%p1%dD".to_owned()),
            parm_right_cursor: Some("\x1b[%p1%dC".to_owned()),
            clr_eol: Some("\x1b[K".to_owned()),
            clr_eos: Some("\x1b[J".to_owned()),
            clear_screen: Some("\x1b[H\x1b[2J".to_owned()),
            carriage_return: Some("\r".to_owned()),
            enter_bold_mode: Some("\x1b[1m".to_owned()),
            enter_dim_mode: Some("\x1b[2m".to_owned()),
            enter_italics_mode: Some("\x1b[3m".to_owned()),
            exit_italics_mode: Some("\x1b[23m".to_owned()),
            enter_underline_mode: Some("\x1b[4m".to_owned()),
            exit_underline_mode: Some("\x1b[24m".to_owned()),
            enter_reverse_mode: Some("\x1b[7m".to_owned()),
            exit_attribute_mode: Some("\x1b[0m".to_owned()),
            set_a_foreground: Some("\x1b[38;5;%p1%dm".to_owned()),
            set_a_background: Some("\x1b[48;5;%p1%dm".to_owned()),
            init_tabs: Some(8),
            max_colors: Some(256),
        }
    }

    /// Whether the terminal is too dumb for differential rendering: any of
    /// the four relative motions missing.
    pub fn is_dumb(&self) -> bool {
        self.cursor_up.is_none()
            || self.cursor_down.is_none()
            || self.cursor_left.is_none()
            || self.cursor_right.is_none()
    }

    /// Whether the soft-wrap elision may be used. Both bits are required:
    /// auto-right-margin makes the terminal wrap at all, and the newline
    /// glitch keeps the wrap deferred so our bookkeeping stays honest.
    pub fn allow_soft_wrap(&self) -> bool {
        self.auto_right_margin && self.eat_newline_glitch
    }

    /// Expand `cursor_address` for a zero-based (x, y) position.
    pub fn addr(&self, x: usize, y: usize) -> Option<String> {
        // terminfo cup takes row first.
        expand(self.cursor_address.as_deref()?, &[y, x])
    }

    /// The capability strings that set or clear visual attributes, used by
    /// escape recognition as a conservative fallback.
    pub(crate) fn visual_attribute_caps(&self) -> [Option<&str>; 8] {
        [
            self.enter_bold_mode.as_deref(),
            self.enter_dim_mode.as_deref(),
            self.enter_italics_mode.as_deref(),
            self.exit_italics_mode.as_deref(),
            self.enter_underline_mode.as_deref(),
            self.exit_underline_mode.as_deref(),
            self.enter_reverse_mode.as_deref(),
            self.exit_attribute_mode.as_deref(),
        ]
    }
}

/// Expand a terminfo parameterized string against `params`.
///
/// Supports `%%`, `%i`, `%p1`..`%p9` and `%d`; anything else returns `None`.
/// `%d` without a preceding `%pN` consumes the next positional parameter.
pub(crate) fn expand(template: &str, params: &[usize]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut params = params.to_vec();
    let mut selected: Option<usize> = None;
    let mut next_positional = 0usize;
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '%' => out.push('%'),
            'i' => {
                for p in params.iter_mut().take(2) {
                    *p += 1;
                }
            }
            'p' => {
                let n = chars.next()?.to_digit(10)? as usize;
                selected = Some(params.get(n.checked_sub(1)?).copied()?);
            }
            'd' => {
                let value = match selected.take() {
                    Some(v) => v,
                    None => {
                        let v = params.get(next_positional).copied()?;
                        next_positional += 1;
                        v
                    }
                };
                out.push_str(&value.to_string());
            }
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn expand_cursor_address() {
        // cup is (row, col), %i makes both one-based.
        let s = expand("\x1b[%i%p1%d;%p2%dH", &[4, 7]).unwrap();
        assert_eq!(s, "\x1b[5;8H");
    }

    #[test]
    fn expand_single_param() {
        assert_eq!(expand("\x1b[%p1%dC", &[12]).unwrap(), "\x1b[12C");
        assert_eq!(expand("\x1b[38;5;%p1%dm", &[196]).unwrap(), "\x1b[38;5;196m");
    }

    #[test]
    fn expand_literal_percent() {
        assert_eq!(expand("100%%", &[]).unwrap(), "100%");
    }

    #[test]
    fn expand_rejects_unsupported_codes() {
        // Real set_a_foreground entries carry %? conditionals; those must
        // disable the path rather than mis-expand.
        assert_eq!(expand("\x1b[%?%p1%{8}%<%t3%p1%d%;m", &[3]), None);
    }

    #[test]
    fn expand_missing_param_fails() {
        assert_eq!(expand("\x1b[%p2%dC", &[1]), None);
    }

    #[test]
    fn addr_is_row_major_one_based() {
        let caps = Capabilities::xterm_256color();
        assert_eq!(caps.addr(0, 0).unwrap(), "\x1b[1;1H");
        assert_eq!(caps.addr(9, 2).unwrap(), "\x1b[3;10H");
    }

    #[test]
    fn dumb_when_motion_missing() {
        let mut caps = Capabilities::xterm_256color();
        assert!(!caps.is_dumb());
        caps.cursor_up = None;
        assert!(caps.is_dumb());
    }

    #[test]
    fn soft_wrap_needs_both_bits() {
        let mut caps = Capabilities::xterm_256color();
        assert!(caps.allow_soft_wrap());
        caps.eat_newline_glitch = false;
        assert!(!caps.allow_soft_wrap());
        caps.eat_newline_glitch = true;
        caps.auto_right_margin = false;
        assert!(!caps.allow_soft_wrap());
    }
}
