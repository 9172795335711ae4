// Bounded expanding-window search for "last N games" lookups.

use chrono::{Duration, NaiveDate};

use betbuddy_core::model::DateWindow;

/// Progress of a window search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Waiting for the games-played count of `[start, date)`.
    Searching { start: NaiveDate },
    /// The window met the games threshold.
    Found(DateWindow),
    /// The maximum lookback was reached without meeting the threshold.
    Exhausted,
}

/// Walks a window backwards from `date` one day at a time, starting at a
/// fixed lag so doubleheaders do not cut the sample short. The floor itself
/// is never searched: with a 7-day lag and 21-day lookback the widest window
/// starts 20 days back.
///
/// Transitions depend only on the games-played count reported for the
/// current window.
#[derive(Debug, Clone)]
pub struct WindowSearch {
    date: NaiveDate,
    floor: NaiveDate,
    threshold: u32,
    state: WindowState,
}

impl WindowSearch {
    pub fn new(date: NaiveDate, initial_lag_days: u32, max_lookback_days: u32, threshold: u32) -> Self {
        Self {
            date,
            floor: date - Duration::days(i64::from(max_lookback_days)),
            threshold,
            state: WindowState::Searching {
                start: date - Duration::days(i64::from(initial_lag_days)),
            },
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    /// The window whose games-played count is needed next.
    pub fn pending_window(&self) -> Option<DateWindow> {
        match self.state {
            WindowState::Searching { start } => Some(DateWindow::before(start, self.date)),
            _ => None,
        }
    }

    /// Feed the games-played count for [`pending_window`](Self::pending_window)
    /// and advance. Has no effect once the search has finished.
    pub fn observe(&mut self, games_played: u32) -> WindowState {
        if let WindowState::Searching { start } = self.state {
            let next = start - Duration::days(1);
            self.state = if games_played >= self.threshold {
                WindowState::Found(DateWindow::before(start, self.date))
            } else if next <= self.floor {
                WindowState::Exhausted
            } else {
                WindowState::Searching { start: next }
            };
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn starts_at_lag_and_widens_one_day() {
        let mut search = WindowSearch::new(date(2024, 6, 15), 7, 21, 10);
        assert_eq!(
            search.pending_window(),
            Some(DateWindow::before(date(2024, 6, 8), date(2024, 6, 15)))
        );
        search.observe(6);
        assert_eq!(search.state(), WindowState::Searching { start: date(2024, 6, 7) });
    }

    #[test]
    fn found_when_threshold_met() {
        let mut search = WindowSearch::new(date(2024, 6, 15), 7, 21, 10);
        for games in [6, 7, 8, 9] {
            search.observe(games);
        }
        let state = search.observe(10);
        assert_eq!(
            state,
            WindowState::Found(DateWindow::before(date(2024, 6, 4), date(2024, 6, 15)))
        );
        // Finished searches ignore further input.
        assert_eq!(search.observe(0), state);
        assert_eq!(search.pending_window(), None);
    }

    #[test]
    fn exhausted_after_max_lookback() {
        let mut search = WindowSearch::new(date(2024, 6, 15), 7, 21, 10);
        let mut observations = 0;
        while let WindowState::Searching { .. } = search.state() {
            search.observe(3);
            observations += 1;
        }
        assert_eq!(search.state(), WindowState::Exhausted);
        // Starts 7..=20 days back: fourteen windows.
        assert_eq!(observations, 14);
    }

    #[test]
    fn widest_window_stops_short_of_the_floor() {
        let mut search = WindowSearch::new(date(2024, 6, 15), 7, 21, 10);
        for _ in 0..13 {
            search.observe(0);
        }
        assert_eq!(
            search.pending_window(),
            Some(DateWindow::before(date(2024, 5, 26), date(2024, 6, 15)))
        );
        // Ten games in the widest window still count.
        assert_eq!(
            search.observe(10),
            WindowState::Found(DateWindow::before(date(2024, 5, 26), date(2024, 6, 15)))
        );
    }
}
