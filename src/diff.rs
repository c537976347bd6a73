//! The diff-and-emit pass.
//!
//! Walks the desired grid against the actual grid line by line and cell by
//! cell, emitting cursor motion, attribute changes, characters and clears
//! into the screen's output buffer. The actual grid's cursor is kept in
//! step with every byte emitted, so motion planning always knows where the
//! terminal really is.
//!
//! Motion picks the cheapest available encoding: nothing at all, a bare
//! carriage return, repeated single-step capabilities, or a parameterized
//! multi-step move; absolute addressing is the fallback when relative
//! motion cannot be expressed.

use smallvec::SmallVec;

use crate::cache::LayoutCache;
use crate::grid::{line_shared_prefix, Cursor};
use crate::layout::ScreenLayout;
use crate::prompt::{calc_prompt_layout, measure_run_from};
use crate::screen::Screen;
use crate::style::Style;
use crate::terminal::{expand, Capabilities};
use crate::width::char_width;

/// Byte budget for a planned cursor motion before spilling to the heap.
type MoveBytes = SmallVec<[u8; 16]>;

impl Screen {
    /// Update the screen to match the desired output. Returns the width of
    /// the right prompt actually drawn (0 when dropped).
    ///
    /// Emission only; the `actual := desired` commit happens in the caller
    /// once the host writer accepts the bytes.
    pub(crate) fn update(
        &mut self,
        cache: &mut LayoutCache,
        caps: &Capabilities,
        layout: &ScreenLayout,
    ) -> usize {
        let left_prompt = layout.left_prompt.clone();
        let right_prompt = layout.right_prompt.clone();

        // Prompt sizes; both strings are already truncated.
        let left_prompt_width =
            calc_prompt_layout(cache, caps, &left_prompt, usize::MAX).0.last_line_width;
        let right_prompt_width =
            calc_prompt_layout(cache, caps, &right_prompt, usize::MAX).0.last_line_width;

        // How many following lines need clearing (usually 0).
        let actual_lines_before_reset = self.actual_lines_before_reset;
        self.actual_lines_before_reset = 0;

        let mut need_clear_lines = self.need_clear_lines;
        let mut need_clear_screen = self.need_clear_screen;
        let mut has_cleared_screen = false;

        let screen_width = self.desired.screen_width;

        if self.actual.screen_width != screen_width {
            // The width changed: everything beyond column 0 of every line
            // is suspect. Skip the clear on the very first render, when the
            // terminal holds nothing of ours yet.
            if self.actual.screen_width.is_some_and(|sw| sw > 0) {
                need_clear_screen = true;
                self.do_move(caps, 0, 0);
                self.reset_line_inner(cache, caps, false);

                need_clear_lines |= self.need_clear_lines;
                need_clear_screen |= self.need_clear_screen;
            }
            self.actual.screen_width = screen_width;
        }
        self.need_clear_lines = false;
        self.need_clear_screen = false;

        // Lines that may hold content we no longer cover.
        let lines_with_stuff = actual_lines_before_reset.max(self.actual.line_count());
        if self.desired.line_count() < lines_with_stuff {
            need_clear_screen = true;
        }

        // Repaint the left prompt if it changed.
        if left_prompt != self.actual_left_prompt {
            self.do_move(caps, 0, 0);
            // Shell-integration marker: a prompt starts here.
            self.out.push_bytes(b"\x1b]133;A\x07");

            let mut start = 0;
            for brk in prompt_line_breaks(cache, caps, &left_prompt) {
                self.out.push_str(&left_prompt[start..brk]);
                self.out.tputs_if_some(caps.clr_eol.as_deref());
                start = brk;
            }
            self.out.push_str(&left_prompt[start..]);
            self.actual_left_prompt = left_prompt.clone();
            self.actual.cursor.x = left_prompt_width;
            // The prompt's own escapes may have left any style active.
            self.out.invalidate_style();
        }

        // Lines holding cells; a trailing empty line only parks the wrapped
        // cursor.
        let content_lines = (0..self.desired.line_count())
            .rev()
            .find(|&i| !self.desired.line(i).is_empty())
            .map_or(0, |i| i + 1);

        for i in 0..self.desired.line_count() {
            self.actual.create_line(i);

            let start_pos = if i == 0 { left_prompt_width } else { 0 };
            let mut current_width = 0;
            let mut has_cleared_line = false;

            // Maybe clear the rest of the screen from this line. Hold off if
            // the cursor is headed for its own wrapped line below the
            // content; clr_eos there would chase it around.
            let should_clear_screen_this_line = need_clear_screen
                && i + 1 == self.desired.line_count()
                && caps.clr_eos.is_some()
                && !(self.desired.cursor.x == 0 && self.desired.cursor.y == content_lines);

            // skip_remaining is a width (not a cell count): how many leading
            // columns of this line are already correct on the terminal.
            let mut skip_remaining = start_pos;

            let shared_prefix =
                line_shared_prefix(self.desired.line(i), self.actual.line(i));
            let mut skip_prefix = shared_prefix;
            let desired_indentation = self.desired.line(i).indentation;
            if shared_prefix < desired_indentation {
                if desired_indentation > self.actual.line(i).indentation
                    && !has_cleared_screen
                    && caps.clr_eol.is_some()
                    && caps.clr_eos.is_some()
                {
                    self.out.set_style(caps, Style::plain());
                    self.do_move(caps, 0, i);
                    self.out.tputs_if_some(if should_clear_screen_this_line {
                        caps.clr_eos.as_deref()
                    } else {
                        caps.clr_eol.as_deref()
                    });
                    has_cleared_screen = should_clear_screen_this_line;
                    has_cleared_line = true;
                }
                skip_prefix = desired_indentation;
            }

            // Skip the prompt and whatever prefix already matches.
            if skip_prefix > 0 {
                let skip_width = if shared_prefix < skip_prefix {
                    skip_prefix
                } else {
                    self.desired.line(i).width_upto(shared_prefix)
                };
                skip_remaining = skip_remaining.max(skip_width);
            }

            if !should_clear_screen_this_line {
                // On a soft-wrapped line whose successor will change, keep
                // the last two columns in play so the rewrite reaches the
                // margin and the terminal's own wrap stays live.
                if self.desired.line(i).is_soft_wrapped && i + 1 < self.desired.line_count() {
                    let mut next_line_will_change = true;
                    if self.desired.line(i + 1).is_empty() {
                        // Nothing will be written there at all.
                        next_line_will_change = false;
                    } else if i + 1 < self.actual.line_count()
                        && line_shared_prefix(
                            self.desired.line(i + 1),
                            self.actual.line(i + 1),
                        ) > 0
                    {
                        next_line_will_change = false;
                    }
                    if next_line_will_change {
                        if let Some(sw) = self.actual.screen_width {
                            skip_remaining = skip_remaining.min(sw.saturating_sub(2));
                        }
                    }
                }
            }

            // Convert the skipped width into a starting cell index.
            let mut j = 0;
            while j < self.desired.line(i).len() {
                let width = char_width(self.desired.line(i).char_at(j));
                if skip_remaining < width {
                    break;
                }
                skip_remaining -= width;
                current_width += width;
                j += 1;
            }
            // Never resume inside a run of zero-width cells.
            while j < self.desired.line(i).len()
                && char_width(self.desired.line(i).char_at(j)) == 0
            {
                j += 1;
            }

            loop {
                let done = j >= self.desired.line(i).len();

                // Clear the screen before writing into the last column; the
                // sticky right edge would otherwise erase what we just
                // wrote. Clearing any earlier would defeat soft wrapping.
                if should_clear_screen_this_line && !has_cleared_screen {
                    let entering_last_column = !done
                        && screen_width.is_some_and(|sw| {
                            current_width + char_width(self.desired.line(i).char_at(j)) >= sw
                        });
                    if done || entering_last_column {
                        self.out.set_style(caps, Style::plain());
                        self.do_move(caps, current_width, i);
                        self.out.tputs_if_some(caps.clr_eos.as_deref());
                        has_cleared_screen = true;
                    }
                }
                if done {
                    break;
                }

                self.handle_soft_wrap(caps, current_width, i);
                self.do_move(caps, current_width, i);
                let cell = self.desired.line(i).cell_at(j);
                self.out.set_style(caps, cell.style);
                let width = char_width(cell.ch);
                self.write_cell(caps, cell.ch, width);
                current_width += width;
                j += 1;
            }

            let mut clear_remainder = false;
            // Clear what the old line had beyond the new one, unless we
            // wrote through to the margin: with auto_right_margin the
            // sticky edge would make clr_eol eat the final character.
            if has_cleared_screen || has_cleared_line {
                // Already clean.
            } else if need_clear_lines && screen_width.is_some_and(|sw| current_width < sw) {
                clear_remainder = true;
            } else if right_prompt_width < self.last_right_prompt_width {
                clear_remainder = true;
            } else if self.actual.line(i).len() != shared_prefix {
                // Only measure the old line when it is not a prefix of the
                // new one; the width sum is hot.
                clear_remainder = self.actual.line(i).width() > current_width;
            }

            // Drop back to the default style either way, so the next line
            // starts from a known state.
            self.out.set_style(caps, Style::plain());
            if clear_remainder && caps.clr_eol.is_some() {
                self.do_move(caps, current_width, i);
                self.out.tputs_if_some(caps.clr_eol.as_deref());
            }

            // The right prompt goes on the first line, flush against the
            // margin.
            if i == 0 && right_prompt_width > 0 {
                if let Some(sw) = screen_width {
                    // Position from column 0 so a disagreement about widths
                    // cannot staircase the prompt.
                    self.do_move(caps, 0, 0);
                    self.do_move(caps, sw - right_prompt_width, i);
                    self.out.set_style(caps, Style::plain());
                    self.out.push_str(&right_prompt);
                    self.actual.cursor.x += right_prompt_width;

                    // We wrote into the last column: some terminals stick,
                    // some run off the edge. Walk back inside the line, then
                    // a carriage return settles the question.
                    let Cursor { x, y } = self.actual.cursor;
                    self.do_move(caps, x - right_prompt_width, y);
                    self.out.push_str("\r");
                    self.actual.cursor.x = 0;
                }
            }
        }

        // Clear any remaining stale lines below our content.
        if !has_cleared_screen && need_clear_screen && caps.clr_eol.is_some() {
            self.out.set_style(caps, Style::plain());
            for i in self.desired.line_count()..lines_with_stuff {
                self.do_move(caps, 0, i);
                self.out.tputs_if_some(caps.clr_eol.as_deref());
            }
        }

        // Park the cursor. When the target is the soft-wrap location the
        // implicit wrap already placed us there and the move collapses to
        // nothing.
        let Cursor { x, y } = self.desired.cursor;
        self.handle_soft_wrap(caps, x, y);
        self.do_move(caps, x, y);
        self.out.reset_style(caps);

        right_prompt_width
    }

    /// Emit the cheapest motion from the actual cursor to `(new_x, new_y)`
    /// and record the new position.
    fn do_move(&mut self, caps: &Capabilities, new_x: usize, new_y: usize) {
        if self.actual.cursor.x == new_x && self.actual.cursor.y == new_y {
            return;
        }

        // A cursor parked on the margin may or may not have stuck to the
        // edge; a cr (or nl, when headed down anyway) resolves the
        // ambiguity.
        if self
            .actual
            .screen_width
            .is_some_and(|sw| self.actual.cursor.x == sw)
        {
            if new_y <= self.actual.cursor.y {
                let cr = caps.carriage_return.as_deref().unwrap_or("\r");
                self.out.push_str(cr);
            } else {
                self.out.push_str("\n");
                self.actual.cursor.y += 1;
            }
            self.actual.cursor.x = 0;
            if self.actual.cursor.x == new_x && self.actual.cursor.y == new_y {
                return;
            }
        }

        let from = self.actual.cursor;
        // Grid rows float with the prompt, so absolute addressing (whose
        // rows are screen-absolute) is only trustworthy as a last resort
        // when relative motion cannot be expressed at all.
        let plan = plan_relative_move(caps, from, new_x, new_y)
            .or_else(|| plan_absolute_move(caps, new_x, new_y));
        let Some(plan) = plan else {
            return;
        };
        self.out.push_bytes(&plan);

        self.actual.cursor.x = new_x;
        self.actual.cursor.y = new_y;
    }

    /// Append one character, tracking the margin for soft wrapping.
    fn write_cell(&mut self, caps: &Capabilities, ch: char, width: usize) {
        self.actual.cursor.x += width;
        self.out.push_char(ch);
        if Some(self.actual.cursor.x) == self.actual.screen_width && caps.allow_soft_wrap() {
            // The terminal may stick to the margin or hang off the edge; we
            // cannot know which, and do_move repairs either on demand.
            self.soft_wrap_location = Some(Cursor::new(0, self.actual.cursor.y + 1));
        } else {
            self.soft_wrap_location = None;
        }
    }

    /// If we are about to output at the soft-wrap location and the previous
    /// line really soft-wrapped, adopt the position without emitting any
    /// motion: the terminal's own wrap takes us there, and copied text gets
    /// no embedded newline. Only valid while the cursor is still parked on
    /// the margin of the line above.
    fn handle_soft_wrap(&mut self, caps: &Capabilities, x: usize, y: usize) {
        if self.soft_wrap_location == Some(Cursor::new(x, y))
            && caps.allow_soft_wrap()
            && self
                .actual
                .screen_width
                .is_some_and(|sw| self.actual.cursor.x == sw)
            && self.actual.cursor.y + 1 == y
            && y <= self.desired.line_count()
            && self.desired.line(y - 1).is_soft_wrapped
        {
            self.actual.cursor = Cursor::new(x, y);
        }
    }
}

/// Byte positions of the newlines separating a prompt's lines, skipping any
/// inside escape sequences.
fn prompt_line_breaks(
    cache: &mut LayoutCache,
    caps: &Capabilities,
    prompt: &str,
) -> SmallVec<[usize; 4]> {
    let mut breaks = SmallVec::new();
    let mut pos = 0;
    while pos < prompt.len() {
        let (_, run_end) = measure_run_from(cache, caps, prompt, pos);
        match prompt[run_end..].chars().next() {
            Some(c) => {
                if c == '\n' || c == '\x0C' {
                    breaks.push(run_end);
                }
                pos = run_end + c.len_utf8();
            }
            None => break,
        }
    }
    breaks
}

/// Plan a relative move: vertical steps, then horizontal. `None` when a
/// needed capability is missing.
fn plan_relative_move(
    caps: &Capabilities,
    from: Cursor,
    new_x: usize,
    new_y: usize,
) -> Option<MoveBytes> {
    let mut bytes = MoveBytes::new();
    let mut x = from.x;

    if new_y < from.y {
        let up = caps.cursor_up.as_deref()?;
        for _ in 0..from.y - new_y {
            bytes.extend_from_slice(up.as_bytes());
        }
    } else if new_y > from.y {
        let down = caps.cursor_down.as_deref()?;
        if down == "\n" {
            // Most consoles use a bare newline as cursor-down; with ONLCR
            // cooked output that also homes the column. Assume it does.
            x = 0;
        }
        for _ in 0..new_y - from.y {
            bytes.extend_from_slice(down.as_bytes());
        }
    }

    if x != new_x {
        if new_x == 0 {
            let cr = caps.carriage_return.as_deref().unwrap_or("\r");
            bytes.extend_from_slice(cr.as_bytes());
        } else {
            let (steps, single, parm) = if new_x < x {
                (x - new_x, caps.cursor_left.as_deref(), caps.parm_left_cursor.as_deref())
            } else {
                (new_x - x, caps.cursor_right.as_deref(), caps.parm_right_cursor.as_deref())
            };
            let single = single?;
            let parm_expanded = parm.and_then(|t| expand(t, &[steps]));
            // The bulk form also sidesteps visual glitches some emulators
            // show on long runs of single steps.
            match parm_expanded {
                Some(p) if p.len() < steps * single.len() => {
                    bytes.extend_from_slice(p.as_bytes());
                }
                _ => {
                    for _ in 0..steps {
                        bytes.extend_from_slice(single.as_bytes());
                    }
                }
            }
        }
    }
    Some(bytes)
}

/// Plan an absolute move via `cursor_address`.
fn plan_absolute_move(caps: &Capabilities, new_x: usize, new_y: usize) -> Option<MoveBytes> {
    let addressed = caps.addr(new_x, new_y)?;
    let mut bytes = MoveBytes::new();
    bytes.extend_from_slice(addressed.as_bytes());
    Some(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn caps() -> Capabilities {
        Capabilities::xterm_256color()
    }

    #[test]
    fn relative_move_uses_cr_for_column_zero() {
        let plan = plan_relative_move(&caps(), Cursor::new(9, 0), 0, 0).unwrap();
        assert_eq!(plan.as_slice(), b"\r");
    }

    #[test]
    fn relative_move_down_homes_the_column_with_newline_cud() {
        // cursor_down is "\n", which also homes the column; no horizontal
        // bytes needed for x=0.
        let plan = plan_relative_move(&caps(), Cursor::new(5, 0), 0, 2).unwrap();
        assert_eq!(plan.as_slice(), b"\n\n");
    }

    #[test]
    fn relative_move_prefers_parm_for_long_runs() {
        let plan = plan_relative_move(&caps(), Cursor::new(0, 0), 12, 0).unwrap();
        assert_eq!(plan.as_slice(), b"\x1b[12C");
    }

    #[test]
    fn relative_move_uses_single_steps_for_short_runs() {
        let plan = plan_relative_move(&caps(), Cursor::new(0, 0), 1, 0).unwrap();
        assert_eq!(plan.as_slice(), b"\x1b[C");
    }

    #[test]
    fn relative_move_left_uses_backspace() {
        let plan = plan_relative_move(&caps(), Cursor::new(5, 0), 3, 0).unwrap();
        assert_eq!(plan.as_slice(), b"\x08\x08");
    }

    #[test]
    fn absolute_move_expands_cup() {
        let plan = plan_absolute_move(&caps(), 7, 4).unwrap();
        assert_eq!(plan.as_slice(), b"\x1b[5;8H");
    }

    #[test]
    fn missing_relative_caps_fall_back_to_none() {
        let mut c = caps();
        c.cursor_up = None;
        assert!(plan_relative_move(&c, Cursor::new(0, 5), 0, 0).is_none());
        // Horizontal-only moves still plan fine.
        assert!(plan_relative_move(&c, Cursor::new(0, 5), 3, 5).is_some());
    }

    #[test]
    fn prompt_line_breaks_skip_escape_payloads() {
        let mut cache = LayoutCache::new();
        let breaks = prompt_line_breaks(&mut cache, &caps(), "a\nb\x1b]0;x\ny\x07c");
        // Only the bare newline counts; the one inside the OSC title does
        // not.
        assert_eq!(breaks.as_slice(), &[1]);
    }
}
