use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum date span the Features API accepts per request, in days.
pub const MAX_WINDOW_DAYS: i64 = 91;

/// One inclusive date sub-range of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// First date of the window (inclusive)
    pub gte: NaiveDate,
    /// Last date of the window (inclusive)
    pub lte: NaiveDate,
}

impl DateWindow {
    pub fn new(gte: NaiveDate, lte: NaiveDate) -> Self {
        DateWindow { gte, lte }
    }

    /// Number of days between the window bounds.
    pub fn span_days(&self) -> i64 {
        (self.lte - self.gte).num_days()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.gte.format("%Y-%m-%d"),
            self.lte.format("%Y-%m-%d")
        )
    }
}

/// Lazy iterator over contiguous date windows covering `[start, end]`.
///
/// The Features API caps each request at `MAX_WINDOW_DAYS`, so a longer
/// range has to be split. Consecutive windows are closed intervals that
/// never share a boundary day: each window closes at
/// `min(cursor + max_span, end)` and the next one starts the day after.
/// `start == end` yields exactly one degenerate window.
///
/// The iterator is finite and `Clone`, so a partitioning can be
/// re-walked without rebuilding it.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use event_features::windows::{DateWindows, MAX_WINDOW_DAYS};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
/// let windows: Vec<_> = DateWindows::new(start, end, MAX_WINDOW_DAYS).collect();
///
/// assert_eq!(windows.len(), 2);
/// assert_eq!(windows[0].lte, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
/// assert_eq!(windows[1].gte, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct DateWindows {
    cursor: NaiveDate,
    end: NaiveDate,
    max_span: Duration,
    done: bool,
}

impl DateWindows {
    /// Creates a partitioning of `[start, end]` into windows spanning at
    /// most `max_span_days` days each.
    ///
    /// An inverted range (`start > end`) produces no windows.
    pub fn new(start: NaiveDate, end: NaiveDate, max_span_days: i64) -> Self {
        DateWindows {
            cursor: start,
            end,
            max_span: Duration::days(max_span_days),
            done: start > end || max_span_days <= 0,
        }
    }
}

impl Iterator for DateWindows {
    type Item = DateWindow;

    fn next(&mut self) -> Option<DateWindow> {
        if self.done {
            return None;
        }

        let bound = std::cmp::min(self.cursor + self.max_span, self.end);
        let window = DateWindow::new(self.cursor, bound);

        if bound >= self.end {
            self.done = true;
        } else {
            self.cursor = bound + Duration::days(1);
        }

        Some(window)
    }
}
