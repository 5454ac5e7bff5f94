use serde::{Deserialize, Serialize};

/// Milliseconds since UNIX epoch (UTC).
pub type TimestampMs = i64;

/// A closed-open time range: [start, end).
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Window {
    pub start: TimestampMs,
    pub end: TimestampMs,
}

impl Window {
    #[inline]
    pub fn new(start: TimestampMs, end: TimestampMs) -> Self {
        debug_assert!(end >= start);
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, ts: TimestampMs) -> bool {
        self.start <= ts && ts < self.end
    }

    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    /// Split [min, max] into `parts` adjacent windows.
    ///
    /// Window `i` starts at `min + i * (max - min) / parts` (integer division), so the
    /// windows share boundaries, leave no gaps and the last one ends exactly at `max`.
    pub fn subdivide(min: TimestampMs, max: TimestampMs, parts: u32) -> Vec<Window> {
        let parts = i128::from(parts.max(1));
        let duration = i128::from(max) - i128::from(min);
        let at = |i: i128| -> TimestampMs {
            // Bounded by `max`, so the narrowing is lossless.
            (i128::from(min) + i * duration / parts) as TimestampMs
        };
        (0..parts).map(|i| Window::new(at(i), at(i + 1))).collect()
    }

    /// Index of the window in `windows` (as built by [`subdivide`](Self::subdivide))
    /// that holds `ts`. The global maximum belongs to the last window even though
    /// windows are right-open.
    pub fn locate(windows: &[Window], ts: TimestampMs, max: TimestampMs) -> Option<usize> {
        let last = windows.len().checked_sub(1)?;
        if ts == max {
            return Some(last);
        }
        let idx = windows.partition_point(|w| w.start <= ts).checked_sub(1)?;
        windows[idx].contains(ts).then_some(idx)
    }
}
