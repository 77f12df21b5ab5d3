//! Live diagnostics for one store process: bounded stderr tail and last transport error

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const STDERR_TAIL_LINES: usize = 200;
/// Longer stderr lines are cut to this many bytes.
pub const STDERR_LINE_BYTES: usize = 4096;

#[derive(Debug)]
pub struct Diagnostics {
    capacity: usize,
    stderr_tail: Mutex<VecDeque<String>>,
    last_error: Mutex<Option<String>>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::with_capacity(STDERR_TAIL_LINES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            stderr_tail: Mutex::new(VecDeque::with_capacity(capacity)),
            last_error: Mutex::new(None),
        }
    }

    /// Append a chunk of stderr output. Empty lines are skipped, long lines are
    /// cut to [`STDERR_LINE_BYTES`] and the oldest lines are evicted once the
    /// tail is full.
    pub fn push_stderr(&self, chunk: &str) {
        let mut tail = lock(&self.stderr_tail);
        for line in chunk.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            tail.push_back(clip(line, STDERR_LINE_BYTES).to_string());
            while tail.len() > self.capacity {
                tail.pop_front();
            }
        }
    }

    pub fn stderr_tail(&self) -> Vec<String> {
        lock(&self.stderr_tail).iter().cloned().collect()
    }

    pub fn record_error(&self, message: impl Into<String>) {
        *lock(&self.last_error) = Some(message.into());
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }
}

/// Longest prefix of `line` within `max` bytes that ends on a char boundary.
pub(crate) fn clip(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_is_bounded_and_keeps_newest() {
        let d = Diagnostics::new();
        for i in 0..450 {
            d.push_stderr(&format!("line {}\n", i));
        }
        let tail = d.stderr_tail();
        assert_eq!(tail.len(), STDERR_TAIL_LINES);
        assert_eq!(tail.first().map(String::as_str), Some("line 250"));
        assert_eq!(tail.last().map(String::as_str), Some("line 449"));
    }

    #[test]
    fn test_chunk_splitting() {
        let d = Diagnostics::with_capacity(3);
        d.push_stderr("a\r\nb\n\n\nc\nd");
        assert_eq!(d.stderr_tail(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_huge_line_is_clipped() {
        let d = Diagnostics::new();
        d.push_stderr(&"x".repeat(8 * 1024 * 1024));
        let tail = d.stderr_tail();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].len(), STDERR_LINE_BYTES);
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        assert_eq!(clip("héllo", 2), "h");
        assert_eq!(clip("héllo", 3), "hé");
        assert_eq!(clip("short", 100), "short");
    }

    #[test]
    fn test_last_error_overwrites() {
        let d = Diagnostics::new();
        assert!(d.last_error().is_none());
        d.record_error("first");
        d.record_error("second");
        assert_eq!(d.last_error().as_deref(), Some("second"));
    }
}
