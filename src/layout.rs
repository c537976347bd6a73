//! Screen layout decisions: what actually fits on the first line.
//!
//! Before any cells are laid down we decide which of the movable pieces
//! survive: the right prompt is dropped when it cannot share line 0 with
//! the left prompt, and the autosuggestion is truncated (possibly to
//! nothing) when the first line cannot hold it. Prompts wider than the
//! screen are truncated up front.

use crate::cache::LayoutCache;
use crate::prompt::calc_prompt_layout;
use crate::terminal::Capabilities;
use crate::width::rendered_width;

/// The pieces chosen for one rendering.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScreenLayout {
    /// The (possibly truncated) left prompt to draw.
    pub left_prompt: String,
    /// Columns reserved for the left prompt on the command line's first row.
    pub left_prompt_space: usize,
    /// The right prompt, empty when dropped.
    pub right_prompt: String,
    /// The autosuggestion suffix to draw, possibly truncated.
    pub autosuggestion: String,
}

/// Given per-offset widths (`width_by_offset[i]` = width of the first `i`
/// characters), the largest offset whose width still fits `max_width`.
fn truncation_offset_for_width(width_by_offset: &[usize], max_width: usize) -> usize {
    debug_assert!(width_by_offset.first() == Some(&0));
    let mut i = 1;
    while i < width_by_offset.len() {
        if width_by_offset[i] > max_width {
            break;
        }
        i += 1;
    }
    // i is the first offset that did not fit.
    i - 1
}

/// Decide prompts and autosuggestion for a screen `screen_width` columns
/// wide.
///
/// Layouts are tried in order: everything visible; autosuggestion
/// truncated; right prompt dropped; right prompt dropped and autosuggestion
/// truncated; finally just the left prompt and command line. A dropped
/// right prompt is not resurrected by later resizes within this render:
/// shrinking the window would wrap it and the cursor could never be trusted
/// again.
pub(crate) fn compute_layout(
    cache: &mut LayoutCache,
    caps: &Capabilities,
    screen_width: usize,
    left_untrunc_prompt: &str,
    right_untrunc_prompt: &str,
    commandline: &str,
    autosuggestion_str: &str,
) -> ScreenLayout {
    let mut result = ScreenLayout::default();

    // Clamp both prompts to the screen width.
    let (left_prompt_layout, left_prompt) =
        calc_prompt_layout(cache, caps, left_untrunc_prompt, screen_width);
    let (right_prompt_layout, mut right_prompt) =
        calc_prompt_layout(cache, caps, right_untrunc_prompt, screen_width);

    let left_prompt_width = left_prompt_layout.last_line_width;
    let mut right_prompt_width = right_prompt_layout.last_line_width;

    // A drawn right prompt also needs one column of breathing room.
    let right_needed = |w: usize| if w > 0 { w + 1 } else { 0 };

    if left_prompt_width + right_needed(right_prompt_width) > screen_width {
        right_prompt.clear();
        right_prompt_width = 0;
    }

    // Width of the command line's first row, and whether more rows follow.
    let mut multiline = false;
    let mut first_line_width = 0;
    for c in commandline.chars() {
        if c == '\n' {
            multiline = true;
            break;
        }
        first_line_width += rendered_width(c);
    }

    // A multiline command line never shows an autosuggestion.
    let mut autosuggestion = autosuggestion_str;
    let mut autosuggest_total_width = 0;
    let mut autosuggest_truncated_widths = Vec::new();
    if multiline {
        autosuggestion = "";
    } else {
        autosuggest_truncated_widths.reserve(1 + autosuggestion_str.chars().count());
        for c in autosuggestion.chars() {
            autosuggest_truncated_widths.push(autosuggest_total_width);
            autosuggest_total_width += rendered_width(c);
        }
        autosuggest_truncated_widths.push(autosuggest_total_width);
    }

    result.left_prompt = left_prompt;
    result.left_prompt_space = left_prompt_width;

    // Case 1: everything fits.
    if left_prompt_width
        + right_needed(right_prompt_width)
        + first_line_width
        + autosuggest_total_width
        <= screen_width
    {
        result.right_prompt = right_prompt;
        result.autosuggestion = autosuggestion.to_owned();
        return result;
    }

    // Case 2: keep the right prompt, truncate the autosuggestion to the
    // columns left on the first row.
    if left_prompt_width + right_needed(right_prompt_width) + first_line_width <= screen_width {
        result.right_prompt = right_prompt;
        let available = screen_width
            - (left_prompt_width + right_needed(right_prompt_width) + first_line_width);
        if autosuggest_total_width > 0 && available > 0 {
            let offset = truncation_offset_for_width(&autosuggest_truncated_widths, available);
            result.autosuggestion = autosuggestion.chars().take(offset).collect();
        }
        return result;
    }

    // Case 3: drop the right prompt, keep the whole autosuggestion.
    if left_prompt_width + first_line_width + autosuggest_total_width <= screen_width {
        result.autosuggestion = autosuggestion.to_owned();
        return result;
    }

    // Case 4: drop the right prompt, truncate the autosuggestion.
    if left_prompt_width + first_line_width <= screen_width {
        let available = screen_width - (left_prompt_width + first_line_width);
        if autosuggest_total_width > 0 && available > 0 {
            let offset = truncation_offset_for_width(&autosuggest_truncated_widths, available);
            result.autosuggestion = autosuggestion.chars().take(offset).collect();
        }
        return result;
    }

    // Case 5: the command line itself wraps; draw prompt and command line
    // and let soft wrapping handle the rest.
    result.autosuggestion = autosuggestion.to_owned();
    result
}
