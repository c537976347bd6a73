//! A small in-test terminal simulator.
//!
//! Interprets the byte stream the renderer emits (cursor motion, clears,
//! printable text) against a character grid, so tests can compare the
//! simulated screen with what the renderer believes it drew. Models an
//! xterm-like terminal: auto right margin with deferred wrap (the newline
//! glitch), and ONLCR-cooked newlines that home the column.

use inkline::width::char_width;

/// Placeholder occupying the second column of a wide character.
const WIDE_PAD: char = '\0';

pub struct TermSim {
    width: usize,
    rows: Vec<Vec<char>>,
    x: usize,
    y: usize,
}

impl TermSim {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: Vec::new(),
            x: 0,
            y: 0,
        }
    }

    /// Cursor position. `x == width` means the cursor is parked on the
    /// margin with the wrap still pending.
    pub fn cursor(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    /// Text of row `y` with trailing blanks trimmed.
    pub fn line_text(&self, y: usize) -> String {
        let Some(row) = self.rows.get(y) else {
            return String::new();
        };
        let mut text: String = row.iter().filter(|&&c| c != WIDE_PAD).collect();
        while text.ends_with(' ') {
            text.pop();
        }
        text
    }

    /// Every non-empty row, top to bottom, with trailing empties dropped.
    pub fn screen_text(&self) -> Vec<String> {
        let mut lines: Vec<String> = (0..self.rows.len()).map(|y| self.line_text(y)).collect();
        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines
    }

    pub fn apply(&mut self, bytes: &[u8]) {
        let text = std::str::from_utf8(bytes).expect("renderer output is UTF-8");
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\r' => {
                    self.x = 0;
                    i += 1;
                }
                '\n' => {
                    // ONLCR: newline also returns the carriage.
                    self.y += 1;
                    self.x = 0;
                    i += 1;
                }
                '\x08' => {
                    self.x = self.x.saturating_sub(1).min(self.width - 1);
                    i += 1;
                }
                '\x07' => {
                    i += 1;
                }
                '\x1b' => {
                    i += self.apply_escape(&chars[i..]);
                }
                c => {
                    self.put(c);
                    i += 1;
                }
            }
        }
    }

    /// Interpret one escape sequence; returns how many chars it consumed.
    fn apply_escape(&mut self, seq: &[char]) -> usize {
        match seq.get(1) {
            Some('[') => {
                // CSI: numeric parameters, then a final byte.
                let mut params: Vec<usize> = Vec::new();
                let mut current = String::new();
                let mut i = 2;
                while i < seq.len() {
                    let c = seq[i];
                    i += 1;
                    if c.is_ascii_digit() {
                        current.push(c);
                        continue;
                    }
                    params.push(current.parse().unwrap_or(0));
                    current.clear();
                    if c == ';' {
                        continue;
                    }
                    self.apply_csi(c, &params);
                    break;
                }
                i
            }
            Some(']') => {
                // OSC: skip through BEL or ST.
                let mut i = 2;
                while i < seq.len() {
                    if seq[i] == '\x07' {
                        return i + 1;
                    }
                    if seq[i] == '\\' && seq[i - 1] == '\x1b' {
                        return i + 1;
                    }
                    i += 1;
                }
                seq.len()
            }
            Some(_) => 2,
            None => 1,
        }
    }

    fn apply_csi(&mut self, final_byte: char, params: &[usize]) {
        let n = params.first().copied().unwrap_or(0).max(1);
        match final_byte {
            'A' => self.y = self.y.saturating_sub(n),
            'B' => self.y += n,
            'C' => self.x = (self.x + n).min(self.width.saturating_sub(1)),
            'D' => self.x = self.x.saturating_sub(n),
            'H' => {
                let row = params.first().copied().unwrap_or(1).max(1);
                let col = params.get(1).copied().unwrap_or(1).max(1);
                self.y = row - 1;
                self.x = (col - 1).min(self.width.saturating_sub(1));
            }
            'J' => {
                // Clear from the cursor to the end of the screen.
                self.clear_to_eol();
                for row in self.rows.iter_mut().skip(self.y + 1) {
                    row.fill(' ');
                }
            }
            'K' => self.clear_to_eol(),
            'm' => {}
            _ => {}
        }
    }

    fn clear_to_eol(&mut self) {
        let (x, y) = (self.x.min(self.width), self.y);
        self.ensure_row(y);
        for cell in self.rows[y].iter_mut().skip(x) {
            *cell = ' ';
        }
    }

    fn ensure_row(&mut self, y: usize) {
        while self.rows.len() <= y {
            self.rows.push(vec![' '; self.width]);
        }
    }

    fn put(&mut self, c: char) {
        let w = char_width(c);
        if w == 0 {
            return;
        }
        // Deferred wrap: a cursor parked on the margin wraps when the next
        // printable character arrives.
        if self.x + w > self.width {
            self.y += 1;
            self.x = 0;
        }
        self.ensure_row(self.y);
        self.rows[self.y][self.x] = c;
        if w == 2 {
            self.rows[self.y][self.x + 1] = WIDE_PAD;
        }
        self.x += w;
    }
}

/// Strip carriage returns, newlines and escape sequences, leaving only the
/// printable cell content of an output stream.
pub fn printable_content(bytes: &[u8]) -> String {
    let text = std::str::from_utf8(bytes).expect("renderer output is UTF-8");
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\r' | '\n' | '\x07' | '\x08' => i += 1,
            '\x1b' => match chars.get(i + 1) {
                Some('[') => {
                    i += 2;
                    while i < chars.len() && !chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    i += 1;
                }
                Some(']') => {
                    i += 2;
                    while i < chars.len() && chars[i] != '\x07' {
                        i += 1;
                    }
                    i += 1;
                }
                _ => i += 2,
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}
