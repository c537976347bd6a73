//! Prompt measurement.
//!
//! Prompts mix printable text with escape sequences, tabs, carriage returns
//! and newlines. Layout needs three numbers out of that soup: how many lines
//! the prompt spans, the width of its widest line, and the width of its last
//! line (where the command line starts). Measurements are cached in the
//! [`LayoutCache`] LRU; prompts wider than the requested maximum are
//! truncated with a leading ellipsis per overlong run.

use crate::cache::{LayoutCache, PromptCacheEntry};
use crate::terminal::Capabilities;
use crate::width::rendered_width;

/// The character marking a truncated prompt run.
pub(crate) const ELLIPSIS: char = '…';

/// Measured shape of a prompt.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PromptLayout {
    /// How many lines the prompt consumes.
    pub line_count: usize,
    /// Width of the widest line.
    pub max_line_width: usize,
    /// Width of the last line.
    pub last_line_width: usize,
}

/// Columns to the next tab stop from `column`.
pub(crate) fn next_tab_stop(column: usize, caps: &Capabilities) -> usize {
    let tab_width = match caps.init_tabs {
        Some(w) if w > 0 => w,
        _ => 8,
    };
    ((column / tab_width) + 1) * tab_width
}

/// Whether `c` ends a measuring run.
fn is_run_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\x0C')
}

/// Measure the run starting at byte `start`; returns (width, end byte).
///
/// Escape sequences add no width; tabs advance to the next tab stop; other
/// characters contribute their rendered width.
pub(crate) fn measure_run_from(
    cache: &mut LayoutCache,
    caps: &Capabilities,
    input: &str,
    start: usize,
) -> (usize, usize) {
    let mut width = 0;
    let mut idx = start;
    while idx < input.len() {
        let Some(c) = input[idx..].chars().next() else {
            break;
        };
        if is_run_terminator(c) {
            break;
        }
        if c == '\x1b' {
            let len = cache.escape_code_length(caps, &input[idx..]);
            idx += len.max(1);
        } else if c == '\t' {
            width = next_tab_stop(width, caps);
            idx += 1;
        } else {
            width += rendered_width(c);
            idx += c.len_utf8();
        }
    }
    (width, idx)
}

/// Truncate `run` (of width `*width`) to at most `desired_width` columns,
/// prepending an ellipsis and dropping characters after it.
fn truncate_run(
    run: &mut String,
    desired_width: usize,
    width: &mut usize,
    cache: &mut LayoutCache,
    caps: &Capabilities,
) {
    let mut curr_width = *width;
    if curr_width < desired_width {
        return;
    }

    run.insert(0, ELLIPSIS);
    curr_width += 1;

    let mut idx = ELLIPSIS.len_utf8();
    while curr_width > desired_width && idx < run.len() {
        let Some(c) = run[idx..].chars().next() else {
            break;
        };
        debug_assert!(!is_run_terminator(c), "run terminator inside a run");
        if c == '\x1b' {
            let len = cache.escape_code_length(caps, &run[idx..]);
            idx += len.max(1);
        } else if c == '\t' {
            // Tabs are miserable to measure while deleting; drop the tab and
            // re-measure from scratch.
            run.remove(idx);
            curr_width = measure_run_from(cache, caps, run, 0).0;
            idx = ELLIPSIS.len_utf8();
        } else {
            curr_width -= curr_width.min(rendered_width(c));
            run.remove(idx);
        }
    }
    *width = curr_width;
}

/// Compute (or fetch) the layout of `prompt`, truncating lines to
/// `max_line_width` columns. Returns the layout and the possibly truncated
/// prompt text.
pub fn calc_prompt_layout(
    cache: &mut LayoutCache,
    caps: &Capabilities,
    prompt: &str,
    max_line_width: usize,
) -> (PromptLayout, String) {
    if cache.find_prompt_layout(prompt, max_line_width) {
        if let Some(entry) = cache.prompt_front() {
            return (entry.layout, entry.trunc_text.clone());
        }
    }

    let mut layout = PromptLayout {
        line_count: 1,
        ..PromptLayout::default()
    };
    let mut trunc_prompt = String::with_capacity(prompt.len());

    let mut run_start = 0;
    loop {
        let (mut line_width, run_end) = measure_run_from(cache, caps, prompt, run_start);
        if line_width <= max_line_width {
            trunc_prompt.push_str(&prompt[run_start..run_end]);
        } else {
            let mut run_storage = prompt[run_start..run_end].to_owned();
            truncate_run(&mut run_storage, max_line_width, &mut line_width, cache, caps);
            trunc_prompt.push_str(&run_storage);
        }
        layout.max_line_width = layout.max_line_width.max(line_width);
        layout.last_line_width = line_width;

        match prompt[run_end..].chars().next() {
            Some(endc) => {
                if endc == '\n' || endc == '\x0C' {
                    layout.line_count += 1;
                    // A trailing newline leaves an empty last line.
                    if run_end == prompt.len() - endc.len_utf8() {
                        layout.last_line_width = 0;
                    }
                }
                trunc_prompt.push(endc);
                run_start = run_end + endc.len_utf8();
            }
            None => break,
        }
    }

    cache.add_prompt_layout(PromptCacheEntry {
        text: prompt.to_owned(),
        max_line_width,
        trunc_text: trunc_prompt.clone(),
        layout,
    });
    (layout, trunc_prompt)
}

/// Line count of a prompt, bypassing the full layout when there is no
/// newline to find.
pub(crate) fn calc_prompt_lines(
    cache: &mut LayoutCache,
    caps: &Capabilities,
    prompt: &str,
) -> usize {
    if prompt.chars().any(|c| matches!(c, '\n' | '\x0C')) {
        calc_prompt_layout(cache, caps, prompt, usize::MAX).0.line_count
    } else {
        1
    }
}
