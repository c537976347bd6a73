#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # inkline
//!
//! The screen-rendering core of an interactive shell: a differential
//! renderer that drives a character-cell terminal from its current state to
//! a desired state (left prompt, optional right prompt, a highlighted
//! command line, an optional pager region, and a cursor) while emitting as
//! few control sequences as it can.
//!
//! The renderer keeps two grids: *desired* (what the screen should show)
//! and *actual* (what we believe it shows). Each render lays out the inputs
//! into the desired grid, diffs it against the actual grid, and emits
//! cursor motion, attribute changes, characters and clears through the
//! host's writer. Prompt measurements and recognized escape sequences are
//! cached process-wide.
//!
//! ## Quick start
//!
//! ```no_run
//! use inkline::prelude::*;
//!
//! let caps = Capabilities::xterm_256color();
//! let mut screen = Screen::new();
//! let pager = Grid::new();
//! let colors = vec![Style::plain(); 7];
//! let indent = vec![0; 7];
//!
//! let mut stdout = std::io::stdout();
//! screen.write(
//!     &mut stdout,
//!     &caps,
//!     TermSize::new(80, 24),
//!     &RenderRequest {
//!         left_prompt: "$ ",
//!         right_prompt: "",
//!         commandline: "echo hi",
//!         explicit_len: 7,
//!         colors: &colors,
//!         indent: &indent,
//!         cursor_pos: 7,
//!         pager: &pager,
//!         cursor_in_pager: false,
//!     },
//! )?;
//! # Ok::<(), inkline::ScreenError>(())
//! ```
//!
//! ## Collaborators
//!
//! Everything else lives in the host: the syntax highlighter supplies one
//! [`Style`] per command-line character, the pager supplies a ready-made
//! [`Grid`], the capability database supplies a [`Capabilities`] value, and
//! the writer is any [`std::io::Write`]. When terminal-related variables
//! change (`$TERM`, locale, capabilities), call
//! [`cache::shared_layout_cache`]`().clear()`.

/// Escape-sequence length recognition.
pub mod ansi;
/// Escape-sequence prefix index and prompt-layout LRU.
pub mod cache;
/// The diff-and-emit pass.
mod diff;
/// Cells, lines, grids and cursors.
pub mod grid;
/// First-line fitting decisions (right prompt, autosuggestion).
mod layout;
/// Buffered output with lazy style emission.
pub mod output;
/// Prompt measurement and truncation.
pub mod prompt;
/// Screen state and the render entry points.
pub mod screen;
/// Highlight style tokens.
pub mod style;
/// The terminal-capability contract.
pub mod terminal;
/// Display-width rules.
pub mod width;

pub use ansi::escape_code_length;
pub use grid::{Cell, Cursor, Grid, Line};
pub use prompt::PromptLayout;
pub use screen::{
    screen_force_clear_to_end, RenderRequest, ResetMode, Screen, ScreenError, TermSize,
    INDENT_STEP,
};
pub use style::{Attr, Style};
pub use terminal::Capabilities;

/// The common imports, re-exported in one place.
pub mod prelude {
    pub use crate::grid::{Cell, Cursor, Grid, Line};
    pub use crate::screen::{RenderRequest, ResetMode, Screen, ScreenError, TermSize};
    pub use crate::style::{Attr, Style};
    pub use crate::terminal::Capabilities;
}
