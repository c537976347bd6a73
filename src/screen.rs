//! The screen: desired and actual contents, and the operations that
//! reconcile them.
//!
//! The interactive reader describes what the screen should look like; the
//! screen keeps a model of what the terminal currently shows and emits a
//! reasonably minimal command stream to get from one to the other. The
//! implementation is less smart than curses allows: it cannot move blocks
//! of text around to handle insertion.

use std::io::{self, Write};

use tracing::{trace, warn};

use crate::cache::shared_layout_cache;
use crate::grid::{Cursor, Grid};
use crate::layout::{compute_layout, ScreenLayout};
use crate::output::Output;
use crate::prompt::{calc_prompt_layout, calc_prompt_lines};
use crate::style::Style;
use crate::terminal::Capabilities;
use crate::width::{rendered_char, rendered_width};

/// Columns of indentation per indent level.
pub const INDENT_STEP: usize = 4;

/// Screens narrower than this are not worth diffing against.
pub(crate) const MIN_TERM_WIDTH: usize = 4;

/// Glyph shown on an abandoned line in place of the missing newline.
const OMITTED_NEWLINE: &str = "⏎";
const OMITTED_NEWLINE_WIDTH: usize = 1;

/// Renderer errors surfaced to the host.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    /// The host writer failed; the actual-screen model was left untouched,
    /// so the next render retries the same diff.
    #[error("writer error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal dimensions as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermSize {
    pub width: isize,
    pub height: isize,
}

impl TermSize {
    pub fn new(width: isize, height: isize) -> Self {
        Self { width, height }
    }
}

/// What to forget about the actual screen after an out-of-band event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetMode {
    /// Do not move to a new line, do not repaint the prompt.
    CurrentLineContents,
    /// Do not move to a new line, do repaint the prompt.
    CurrentLineAndPrompt,
    /// Abandon the current line, go to the next one, repaint the prompt.
    AbandonLine,
    /// Abandon the current line and clear the rest of the screen.
    AbandonLineAndClearToEndOfScreen,
}

/// One render's inputs.
#[derive(Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Prompt drawn before the command line.
    pub left_prompt: &'a str,
    /// Prompt drawn at the right edge of line 0, if it fits.
    pub right_prompt: &'a str,
    /// The command line, including any autosuggestion suffix.
    pub commandline: &'a str,
    /// Number of user-typed characters; the rest is autosuggestion.
    pub explicit_len: usize,
    /// Per-character highlight styles; length must equal the command line's
    /// character count.
    pub colors: &'a [Style],
    /// Per-character indent levels; same length contract as `colors`.
    pub indent: &'a [usize],
    /// Cursor offset in characters within the command line.
    pub cursor_pos: usize,
    /// Pre-rendered pager content to append below the command line.
    pub pager: &'a Grid,
    /// Whether the cursor lives in the pager rather than the command line.
    pub cursor_in_pager: bool,
}

/// Stat fields used to detect foreign writes to the tty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct StatSnapshot {
    dev: u64,
    ino: u64,
    size: i64,
    mtime: i64,
    mtime_nsec: i64,
}

fn stat_fd(fd: libc::c_int) -> StatSnapshot {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut st) } != 0 {
        return StatSnapshot::default();
    }
    StatSnapshot {
        dev: st.st_dev as u64,
        ino: st.st_ino as u64,
        size: st.st_size as i64,
        mtime: st.st_mtime as i64,
        mtime_nsec: st.st_mtime_nsec as i64,
    }
}

/// Whether stdout timestamps can tell us anything: only a real tty has
/// write timestamps worth comparing.
fn tty_timestamps_usable() -> bool {
    unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 }
}

/// Saved fields restored when a flush fails mid-render.
struct Checkpoint {
    actual: Grid,
    actual_left_prompt: String,
    last_right_prompt_width: usize,
    soft_wrap_location: Option<Cursor>,
    need_clear_lines: bool,
    need_clear_screen: bool,
    actual_lines_before_reset: usize,
}

/// The current and desired screen contents.
pub struct Screen {
    /// Whether the last-drawn autosuggestion (if any) is truncated, or
    /// hidden entirely.
    pub autosuggestion_is_truncated: bool,

    /// What the screen should show after this render.
    pub(crate) desired: Grid,
    /// What we believe the terminal shows now.
    pub(crate) actual: Grid,
    /// The prompt last printed to the screen.
    pub(crate) actual_left_prompt: String,
    /// Last right prompt width, so stale cells get cleared after it shrinks
    /// or disappears.
    pub(crate) last_right_prompt_width: usize,
    /// If soft wrapping applies, we may output at this location without any
    /// cursor motion.
    pub(crate) soft_wrap_location: Option<Cursor>,
    /// The uncovered parts of screen lines may hold junk; clr_eol is then
    /// required at the end of each line.
    pub(crate) need_clear_lines: bool,
    /// There may be content below our lines; issue clr_eos if possible.
    pub(crate) need_clear_screen: bool,
    /// Line count of the actual screen before the last reset, so lines the
    /// new rendering no longer covers still get cleared.
    pub(crate) actual_lines_before_reset: usize,
    /// stdout/stderr snapshots taken after our own writes; a mismatch on
    /// the next render means someone else wrote to the tty.
    saved_stats: [StatSnapshot; 2],
    pub(crate) out: Output,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    pub fn new() -> Self {
        let mut screen = Self {
            autosuggestion_is_truncated: false,
            desired: Grid::new(),
            actual: Grid::new(),
            actual_left_prompt: String::new(),
            last_right_prompt_width: 0,
            soft_wrap_location: None,
            need_clear_lines: false,
            need_clear_screen: false,
            actual_lines_before_reset: 0,
            saved_stats: [StatSnapshot::default(); 2],
            out: Output::new(),
        };
        screen.save_status();
        screen
    }

    /// Render the desired contents, emitting as few terminal commands as
    /// possible through `sink`.
    ///
    /// On writer failure nothing is committed: the actual-screen model is
    /// rolled back and the next call re-attempts the same diff.
    pub fn write<W: Write>(
        &mut self,
        sink: &mut W,
        caps: &Capabilities,
        size: TermSize,
        req: &RenderRequest<'_>,
    ) -> Result<(), ScreenError> {
        trace!(width = size.width, height = size.height, "repaint");

        // A terminal without cursor motion gets a plain reprint.
        if caps.is_dumb() {
            self.out.push_str("\r");
            self.out.push_str(req.left_prompt);
            for c in req.commandline.chars().take(req.explicit_len) {
                self.out.push_char(c);
            }
            self.out.flush_to(sink)?;
            return Ok(());
        }

        // Did someone else write to the tty since our last render?
        if self.check_status() {
            let width = usize::try_from(size.width).unwrap_or(0);
            self.reset_abandoning_line(sink, caps, width)?;
        }

        let cmd_char_count = req.commandline.chars().count();
        let width_ok = size.width >= MIN_TERM_WIDTH as isize;
        let inputs_ok =
            req.colors.len() == cmd_char_count && req.indent.len() == cmd_char_count;
        let degraded = !width_ok || !inputs_ok;

        let mut cache = shared_layout_cache();

        let (layout, explicit, suggestion);
        if degraded {
            if !width_ok {
                warn!(width = size.width, "terminal too narrow; rendering prompt only");
            } else {
                warn!(
                    commandline_chars = cmd_char_count,
                    colors = req.colors.len(),
                    indent = req.indent.len(),
                    "per-character input length mismatch; rendering prompt only"
                );
            }
            let (prompt_layout, left_prompt) =
                calc_prompt_layout(&mut cache, caps, req.left_prompt, usize::MAX);
            layout = ScreenLayout {
                left_prompt,
                left_prompt_space: prompt_layout.last_line_width,
                right_prompt: String::new(),
                autosuggestion: String::new(),
            };
            explicit = String::new();
            suggestion = String::new();
        } else {
            let explicit_len = req.explicit_len.min(cmd_char_count);
            let mut chars = req.commandline.chars();
            explicit = chars.by_ref().take(explicit_len).collect::<String>();
            suggestion = chars.collect::<String>();
            layout = compute_layout(
                &mut cache,
                caps,
                usize::try_from(size.width).unwrap_or(0),
                req.left_prompt,
                req.right_prompt,
                &explicit,
                &suggestion,
            );
        }

        self.autosuggestion_is_truncated =
            !suggestion.is_empty() && suggestion != layout.autosuggestion;

        let screen_width = if width_ok {
            Some(usize::try_from(size.width).unwrap_or(0))
        } else {
            None
        };

        let effective: Vec<char> = explicit
            .chars()
            .chain(layout.autosuggestion.chars())
            .collect();
        let mut cursor_arr = self.build_desired(screen_width, &layout, &effective, req);
        // Trailing empty lines (a cursor wrapped past a full line) hold no
        // content and do not count against the height budget.
        let full_line_count = (0..self.desired.line_count())
            .rev()
            .find(|&i| !self.desired.line(i).is_empty())
            .map_or(1, |i| i + 1);

        // Height budget: if the suggestion pushed us past the rows left
        // after the pager reservation, hide it entirely.
        if !layout.autosuggestion.is_empty() && size.height > 0 {
            let available_rows = usize::try_from(size.height)
                .unwrap_or(usize::MAX)
                .saturating_sub(req.pager.line_count())
                .max(1);
            if full_line_count > available_rows {
                self.autosuggestion_is_truncated = true;
                let explicit_only: Vec<char> = explicit.chars().collect();
                cursor_arr = self.build_desired(screen_width, &layout, &explicit_only, req);
            }
        }

        if req.cursor_in_pager {
            if req.pager.is_empty() {
                warn!("cursor placed in an empty pager; using the command-line cursor");
                self.desired.cursor = cursor_arr;
            } else {
                let pager_top = self.desired.line_count();
                self.desired.cursor =
                    Cursor::new(req.pager.cursor.x, pager_top + req.pager.cursor.y);
            }
        } else {
            self.desired.cursor = cursor_arr;
        }

        self.desired.append_lines(req.pager);

        let checkpoint = Checkpoint {
            actual: self.actual.clone(),
            actual_left_prompt: self.actual_left_prompt.clone(),
            last_right_prompt_width: self.last_right_prompt_width,
            soft_wrap_location: self.soft_wrap_location,
            need_clear_lines: self.need_clear_lines,
            need_clear_screen: self.need_clear_screen,
            actual_lines_before_reset: self.actual_lines_before_reset,
        };

        let right_prompt_width = self.update(&mut cache, caps, &layout);
        drop(cache);

        match self.out.flush_to(sink) {
            Ok(()) => {
                self.actual.clone_from(&self.desired);
                self.last_right_prompt_width = right_prompt_width;
                self.save_status();
                Ok(())
            }
            Err(err) => {
                self.actual = checkpoint.actual;
                self.actual_left_prompt = checkpoint.actual_left_prompt;
                self.last_right_prompt_width = checkpoint.last_right_prompt_width;
                self.soft_wrap_location = checkpoint.soft_wrap_location;
                self.need_clear_lines = checkpoint.need_clear_lines;
                self.need_clear_screen = checkpoint.need_clear_screen;
                self.actual_lines_before_reset = checkpoint.actual_lines_before_reset;
                Err(err.into())
            }
        }
    }

    /// Rebuild the desired grid from prompt space plus `chars`; returns the
    /// grid position recorded for the command-line cursor.
    fn build_desired(
        &mut self,
        screen_width: Option<usize>,
        layout: &ScreenLayout,
        chars: &[char],
        req: &RenderRequest<'_>,
    ) -> Cursor {
        self.desired.screen_width = screen_width;
        self.desired.resize(0);
        self.desired.cursor = Cursor::default();

        for _ in 0..layout.left_prompt_space {
            self.desired_append_char(' ', Style::plain(), 0, 1);
        }

        // Track the command-line cursor even in pager mode; it is the
        // fallback when the pager turns out to be empty.
        let mut cursor_arr = Cursor::default();
        let mut i = 0;
        while i < chars.len() {
            if i == req.cursor_pos {
                cursor_arr = self.desired.cursor;
            }
            let c = chars[i];
            let style = req.colors.get(i).copied().unwrap_or_default();
            let indent = req.indent.get(i).copied().unwrap_or_default();
            self.desired_append_char(c, style, indent, rendered_width(c));
            i += 1;
        }
        if i == req.cursor_pos {
            cursor_arr = self.desired.cursor;
        }
        cursor_arr
    }

    /// Append one character to the desired grid, handling newlines, carriage
    /// returns and lines longer than the screen width.
    fn desired_append_char(&mut self, b: char, style: Style, indent: usize, bwidth: usize) {
        let mut line_no = self.desired.cursor.y;

        if b == '\n' {
            // Current line is definitely hard wrapped.
            self.desired.create_line(self.desired.cursor.y + 1);
            self.desired.line_mut(self.desired.cursor.y).is_soft_wrapped = false;
            self.desired.cursor.y += 1;
            self.desired.cursor.x = 0;
            let line_no = self.desired.cursor.y;
            let indentation = indent * INDENT_STEP;
            self.desired.line_mut(line_no).indentation = indentation;
            for _ in 0..indentation {
                self.desired_append_char(' ', Style::plain(), indent, 1);
            }
        } else if b == '\r' {
            self.desired.create_line(line_no).clear();
            self.desired.cursor.x = 0;
        } else {
            let screen_width = self.desired.screen_width;
            let cw = bwidth;
            self.desired.create_line(line_no);

            // At the end of the line? Continue on the next one.
            if screen_width.is_some_and(|sw| self.desired.cursor.x + cw > sw) {
                self.desired.line_mut(line_no).is_soft_wrapped = true;
                // A wide character pushed off the edge leaves a hole; pad it
                // so a soft-wrapped line always spans the full width.
                if let Some(sw) = screen_width {
                    let mut w = self.desired.line(line_no).width();
                    while w < sw {
                        self.desired.line_mut(line_no).push(' ', Style::plain());
                        w += 1;
                    }
                }
                line_no = self.desired.line_count();
                self.desired.add_line();
                self.desired.cursor.y += 1;
                self.desired.cursor.x = 0;
            }

            self.desired.line_mut(line_no).push(rendered_char(b), style);
            self.desired.cursor.x += cw;

            // Wrap the cursor even when the line itself just filled up; this
            // avoids wonkiness in the last column.
            if screen_width.is_some_and(|sw| self.desired.cursor.x >= sw) {
                self.desired.line_mut(line_no).is_soft_wrapped = true;
                self.desired.cursor.x = 0;
                self.desired.cursor.y += 1;
                self.desired.create_line(self.desired.cursor.y);
            }
        }
    }

    /// Forget what is on the current line (and optionally the prompt), so
    /// the next render repaints it.
    pub fn reset_line<W: Write>(
        &mut self,
        sink: &mut W,
        caps: &Capabilities,
        repaint_prompt: bool,
    ) -> Result<(), ScreenError> {
        let mut cache = shared_layout_cache();
        self.reset_line_inner(&mut cache, caps, repaint_prompt);
        drop(cache);
        self.out.flush_to(sink)?;
        self.save_status();
        Ok(())
    }

    /// The buffered body of [`reset_line`]; also used mid-update on a width
    /// change, when the caller already holds the cache lock.
    pub(crate) fn reset_line_inner(
        &mut self,
        cache: &mut crate::cache::LayoutCache,
        caps: &Capabilities,
        repaint_prompt: bool,
    ) {
        self.actual_lines_before_reset = self
            .actual_lines_before_reset
            .max(self.actual.line_count());

        if repaint_prompt {
            // A multi-line prompt means "line 0" sits below the prompt's
            // first line; bias the cursor so the repaint climbs all the way
            // back up.
            let prompt_line_count = calc_prompt_lines(cache, caps, &self.actual_left_prompt);
            self.actual.cursor.y += prompt_line_count.saturating_sub(1);
            self.actual_left_prompt.clear();
        }
        self.actual.resize(0);
        self.need_clear_lines = true;
        self.soft_wrap_location = None;

        // Keeps the next repaint from drifting horizontally.
        self.out.push_str("\r");
        self.actual.cursor.x = 0;
    }

    /// Abandon the current line: show the omitted-newline glyph, force a
    /// wrap onto a fresh line, and clean up after ourselves.
    pub fn reset_abandoning_line<W: Write>(
        &mut self,
        sink: &mut W,
        caps: &Capabilities,
        screen_width: usize,
    ) -> Result<(), ScreenError> {
        self.actual_lines_before_reset = self
            .actual_lines_before_reset
            .max(self.actual.line_count());
        self.actual.cursor.y = 0;
        self.actual.resize(0);
        self.actual_left_prompt.clear();
        self.need_clear_lines = true;
        self.soft_wrap_location = None;

        if screen_width > OMITTED_NEWLINE_WIDTH {
            // Draw the glyph dimmed or grey so it reads as chrome, not
            // output.
            let mut styled = self.out.tputs_if_some(caps.enter_dim_mode.as_deref());
            if !styled {
                let max_colors = caps.max_colors.unwrap_or(0);
                if max_colors >= 238 {
                    styled = self
                        .out
                        .tparm_if_some(caps.set_a_foreground.as_deref(), &[237]);
                } else if max_colors >= 9 {
                    styled = self
                        .out
                        .tparm_if_some(caps.set_a_foreground.as_deref(), &[8]);
                } else if max_colors >= 2 && caps.enter_bold_mode.is_some() {
                    self.out.tputs_if_some(caps.enter_bold_mode.as_deref());
                    styled = self
                        .out
                        .tparm_if_some(caps.set_a_foreground.as_deref(), &[0]);
                }
            }
            self.out.push_str(OMITTED_NEWLINE);
            if styled {
                self.out.tputs_if_some(caps.exit_attribute_mode.as_deref());
            }

            // Fill the rest of the line so the terminal wraps for us
            // (PROMPT_SP). Without the newline glitch the wrap eats a
            // column.
            let glitch_pad = usize::from(!caps.eat_newline_glitch);
            for _ in 0..screen_width - OMITTED_NEWLINE_WIDTH - glitch_pad {
                self.out.push_str(" ");
            }
        }

        self.out.push_str("\r");
        self.out.push_str(OMITTED_NEWLINE);
        // We are now surely on a fresh line, possibly with a stray glyph on
        // it; overwrite it and clear the line.
        for _ in 0..OMITTED_NEWLINE_WIDTH {
            self.out.push_str(" ");
        }
        self.out.push_str("\r");
        self.out.tputs_if_some(caps.clr_eol.as_deref());
        self.out.invalidate_style();

        self.out.flush_to(sink)?;
        self.actual.cursor.x = 0;

        self.save_status();
        Ok(())
    }

    /// Invalidate the actual-screen model according to `mode`.
    pub fn reset<W: Write>(
        &mut self,
        sink: &mut W,
        caps: &Capabilities,
        screen_width: usize,
        mode: ResetMode,
    ) -> Result<(), ScreenError> {
        match mode {
            ResetMode::CurrentLineContents => self.reset_line(sink, caps, false),
            ResetMode::CurrentLineAndPrompt => self.reset_line(sink, caps, true),
            ResetMode::AbandonLine => self.reset_abandoning_line(sink, caps, screen_width),
            ResetMode::AbandonLineAndClearToEndOfScreen => {
                self.reset_abandoning_line(sink, caps, screen_width)?;
                self.need_clear_screen = true;
                Ok(())
            }
        }
    }

    /// The grid most recently committed to the terminal. Exposed for tests.
    pub fn actual_contents(&self) -> &Grid {
        &self.actual
    }

    /// The grid produced by the most recent layout pass. Exposed for tests.
    pub fn desired_contents(&self) -> &Grid {
        &self.desired
    }

    /// Whether the cursor sits alone on a trailing wrapped line (soft or
    /// hard): column 0 of a line that holds no content, below everything
    /// that does.
    pub fn cursor_is_wrapped_to_own_line(&self) -> bool {
        let cursor = self.actual.cursor;
        if cursor.x != 0 {
            return false;
        }
        cursor.y == self.actual.line_count()
            || (cursor.y + 1 == self.actual.line_count()
                && self.actual.line(cursor.y).is_empty())
    }

    /// Stat stdout and stderr and remember the result, so our own writes do
    /// not read as foreign output.
    pub fn save_status(&mut self) {
        self.saved_stats = [
            stat_fd(libc::STDOUT_FILENO),
            stat_fd(libc::STDERR_FILENO),
        ];
    }

    /// Whether stdout/stderr changed behind our back since `save_status`.
    fn check_status(&mut self) -> bool {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        if !tty_timestamps_usable() {
            // Without trustworthy timestamps, assume nothing happened; this
            // keeps multi-line prompts working.
            return false;
        }
        let current = [
            stat_fd(libc::STDOUT_FILENO),
            stat_fd(libc::STDERR_FILENO),
        ];
        current != self.saved_stats
    }
}

/// Issue an immediate clr_eos through `sink`, independent of any screen.
pub fn screen_force_clear_to_end<W: Write>(
    sink: &mut W,
    caps: &Capabilities,
) -> Result<(), ScreenError> {
    if let Some(clr_eos) = caps.clr_eos.as_deref() {
        sink.write_all(clr_eos.as_bytes())?;
        sink.flush()?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn caps() -> Capabilities {
        Capabilities::xterm_256color()
    }

    #[test]
    fn force_clear_to_end_emits_clr_eos() {
        let mut sink = Vec::new();
        screen_force_clear_to_end(&mut sink, &caps()).unwrap();
        assert_eq!(sink, b"\x1b[J");
    }

    #[test]
    fn force_clear_without_capability_is_silent() {
        let mut sink = Vec::new();
        screen_force_clear_to_end(&mut sink, &Capabilities::default()).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn reset_line_emits_carriage_return_and_marks_dirty() {
        let mut screen = Screen::new();
        let mut sink = Vec::new();
        screen
            .reset(&mut sink, &caps(), 80, ResetMode::CurrentLineContents)
            .unwrap();
        assert_eq!(sink, b"\r");
        assert!(screen.need_clear_lines);
        assert!(!screen.need_clear_screen);
        assert_eq!(screen.actual.line_count(), 0);
        assert_eq!(screen.actual.cursor.x, 0);
    }

    #[test]
    fn abandon_line_forces_a_wrap() {
        let mut screen = Screen::new();
        let mut sink = Vec::new();
        screen
            .reset(&mut sink, &caps(), 20, ResetMode::AbandonLine)
            .unwrap();
        let text = String::from_utf8(sink).unwrap();
        // Glyph, padding to the margin, then the cleanup pass.
        assert!(text.contains(OMITTED_NEWLINE));
        assert!(text.ends_with("\r\x1b[K"));
        assert!(screen.need_clear_lines);
        assert!(!screen.need_clear_screen);
    }

    #[test]
    fn abandon_line_and_clear_marks_clear_screen() {
        let mut screen = Screen::new();
        let mut sink = Vec::new();
        screen
            .reset(
                &mut sink,
                &caps(),
                20,
                ResetMode::AbandonLineAndClearToEndOfScreen,
            )
            .unwrap();
        assert!(screen.need_clear_screen);
    }

    #[test]
    fn dumb_terminal_prints_plainly() {
        let mut screen = Screen::new();
        let mut sink = Vec::new();
        let pager = Grid::new();
        let colors = [Style::plain(); 7];
        let indent = [0usize; 7];
        let req = RenderRequest {
            left_prompt: "$ ",
            right_prompt: "",
            commandline: "echo hi",
            explicit_len: 7,
            colors: &colors,
            indent: &indent,
            cursor_pos: 7,
            pager: &pager,
            cursor_in_pager: false,
        };
        screen
            .write(
                &mut sink,
                &Capabilities::default(),
                TermSize::new(80, 24),
                &req,
            )
            .unwrap();
        assert_eq!(sink, b"\r$ echo hi");
        // Nothing was modelled: no diffing happened.
        assert_eq!(screen.actual.line_count(), 0);
    }
}
