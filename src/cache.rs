//! The layout cache: a prefix index of known escape sequences and an LRU of
//! prompt layouts.
//!
//! Both structures are keyed, implicitly, off the terminal-capability state:
//! the host must call [`LayoutCache::clear`] (usually through
//! [`shared_layout_cache`]) whenever `$TERM`, the locale, or any capability
//! variable changes. With that discipline the prompt string alone is a valid
//! cache key.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::ansi;
use crate::prompt::PromptLayout;
use crate::terminal::Capabilities;

/// A cached prompt measurement.
#[derive(Clone, Debug)]
pub struct PromptCacheEntry {
    /// Original prompt string.
    pub text: String,
    /// Max line width used when computing the layout (for truncation).
    pub max_line_width: usize,
    /// Resulting truncated prompt string.
    pub trunc_text: String,
    /// Resulting layout.
    pub layout: PromptLayout,
}

/// Escape-sequence prefix index plus prompt-layout LRU.
#[derive(Default)]
pub struct LayoutCache {
    // Sorted lexicographically and prefix-free: no entry is a prefix of
    // another. Membership-by-prefix is then a single binary search.
    esc_cache: Vec<String>,
    prompt_cache: VecDeque<PromptCacheEntry>,
}

/// Hard capacity of the prompt LRU.
pub const PROMPT_CACHE_MAX_SIZE: usize = 8;

impl LayoutCache {
    pub const fn new() -> Self {
        Self {
            esc_cache: Vec::new(),
            prompt_cache: VecDeque::new(),
        }
    }

    /// Number of cached escape sequences.
    pub fn esc_cache_len(&self) -> usize {
        self.esc_cache.len()
    }

    /// Insert `s` at its sorted position if not already present.
    ///
    /// An entry that is a prefix of an existing entry, or has one as a
    /// prefix, would break the prefix-freeness the lookup depends on; such
    /// entries are refused.
    pub fn add_escape_code(&mut self, s: String) {
        if s.is_empty() {
            return;
        }
        match self.esc_cache.binary_search(&s) {
            Ok(_) => {}
            Err(pos) => {
                let conflicts = (pos > 0 && s.starts_with(self.esc_cache[pos - 1].as_str()))
                    || self
                        .esc_cache
                        .get(pos)
                        .is_some_and(|next| next.starts_with(s.as_str()));
                if conflicts {
                    tracing::debug!(sequence = ?s, "refusing prefix-conflicting escape code");
                    return;
                }
                self.esc_cache.insert(pos, s);
            }
        }
    }

    /// Length of the cached sequence that prefixes `entry`, or 0.
    ///
    /// Binary-search for the upper bound; because the cache is prefix-free,
    /// if any cached code prefixes `entry` it is the upper bound's
    /// predecessor.
    pub fn find_escape_code(&self, entry: &str) -> usize {
        match self.esc_cache.binary_search_by(|e| e.as_str().cmp(entry)) {
            Ok(_) => entry.len(),
            Err(pos) => {
                if pos > 0 {
                    let candidate = &self.esc_cache[pos - 1];
                    if entry.starts_with(candidate.as_str()) {
                        return candidate.len();
                    }
                }
                0
            }
        }
    }

    /// Length of the escape sequence at the start of `code`, learning newly
    /// recognized sequences as it goes.
    pub fn escape_code_length(&mut self, caps: &Capabilities, code: &str) -> usize {
        if !code.starts_with('\x1b') {
            return 0;
        }
        let cached = self.find_escape_code(code);
        if cached != 0 {
            return cached;
        }
        match ansi::raw_escape_code_length(caps, code) {
            Some(len) => {
                self.add_escape_code(code[..len].to_owned());
                len
            }
            None => 0,
        }
    }

    /// Look up a prompt layout, promoting the hit to the front.
    pub fn find_prompt_layout(&mut self, text: &str, max_line_width: usize) -> bool {
        let hit = self
            .prompt_cache
            .iter()
            .position(|e| e.text == text && e.max_line_width == max_line_width);
        match hit {
            Some(0) => true,
            Some(i) => {
                if let Some(entry) = self.prompt_cache.remove(i) {
                    self.prompt_cache.push_front(entry);
                }
                true
            }
            None => false,
        }
    }

    /// The most recently used prompt entry.
    pub fn prompt_front(&self) -> Option<&PromptCacheEntry> {
        self.prompt_cache.front()
    }

    /// Number of cached prompt layouts.
    pub fn prompt_cache_len(&self) -> usize {
        self.prompt_cache.len()
    }

    /// Add a prompt entry at the front, evicting the least recently used
    /// entry beyond [`PROMPT_CACHE_MAX_SIZE`].
    pub fn add_prompt_layout(&mut self, entry: PromptCacheEntry) {
        self.prompt_cache.push_front(entry);
        if self.prompt_cache.len() > PROMPT_CACHE_MAX_SIZE {
            self.prompt_cache.pop_back();
        }
    }

    /// Drop everything. Idempotent; called when terminal variables change.
    pub fn clear(&mut self) {
        self.esc_cache.clear();
        self.prompt_cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn esc_cache_entries(&self) -> &[String] {
        &self.esc_cache
    }
}

// Process-wide cache instance. The renderer is single-threaded by contract;
// the mutex exists so hosts that touch the cache from elsewhere stay sound.
static LAYOUT_CACHE: Mutex<LayoutCache> = Mutex::new(LayoutCache::new());

/// Lock the process-wide layout cache.
///
/// Call `.clear()` on the guard whenever terminal-related variables change.
pub fn shared_layout_cache() -> MutexGuard<'static, LayoutCache> {
    match LAYOUT_CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
