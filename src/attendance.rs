//! Attendance mark-window calculation.
//!
//! A session (dated lesson instance) can only be marked attended while its
//! window is open: from the scheduled start up to a configured grace period
//! after the scheduled end, half-open on the right. All times are naive wall
//! clock combined into UTC; the platform schedules in a single timezone.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::time::Duration;
use utoipa::ToSchema;

/// Where a session stands relative to its mark window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Window has not opened yet
    Upcoming,
    /// Window is open and the session is unmarked
    Pending,
    /// Session was marked attended
    Attended,
    /// Window closed without the session being marked
    Missed,
}

/// The interval during which a session may be marked attended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MarkWindow {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

impl MarkWindow {
    /// Window for a session on `date` scheduled `start_time..end_time`, with
    /// `grace` added after the end.
    pub fn for_session(date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime, grace: Duration) -> Self {
        let opens_at = Utc.from_utc_datetime(&date.and_time(start_time));
        let closes_at = Utc.from_utc_datetime(&date.and_time(end_time))
            + chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());
        Self { opens_at, closes_at }
    }

    /// True while marking is allowed. The right edge is exclusive: at exactly
    /// `closes_at` the window is shut.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.opens_at <= now && now < self.closes_at
    }
}

/// Status of a session given its window, mark state and the current time.
pub fn session_status(is_attended: bool, window: MarkWindow, now: DateTime<Utc>) -> SessionStatus {
    if is_attended {
        SessionStatus::Attended
    } else if now < window.opens_at {
        SessionStatus::Upcoming
    } else if now < window.closes_at {
        SessionStatus::Pending
    } else {
        SessionStatus::Missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_secs(30 * 60);

    fn window() -> MarkWindow {
        // 09:00-10:30 session with 30 minutes of grace
        MarkWindow::for_session(
            NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            GRACE,
        )
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 9, 2)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap(),
        )
    }

    #[test]
    fn window_spans_start_to_end_plus_grace() {
        let w = window();
        assert_eq!(w.opens_at, at(9, 0));
        assert_eq!(w.closes_at, at(11, 0));
    }

    #[test]
    fn before_start_is_upcoming_and_unmarkable() {
        let w = window();
        assert!(!w.is_open(at(8, 59)));
        assert_eq!(session_status(false, w, at(8, 59)), SessionStatus::Upcoming);
    }

    #[test]
    fn open_window_boundaries() {
        let w = window();
        // Opens exactly at the scheduled start.
        assert!(w.is_open(at(9, 0)));
        assert!(w.is_open(at(10, 59)));
        // Shut at exactly end + grace.
        assert!(!w.is_open(at(11, 0)));
    }

    #[test]
    fn unmarked_session_in_window_is_pending() {
        let w = window();
        assert_eq!(session_status(false, w, at(9, 30)), SessionStatus::Pending);
    }

    #[test]
    fn marked_session_is_attended_regardless_of_time() {
        let w = window();
        assert_eq!(session_status(true, w, at(8, 0)), SessionStatus::Attended);
        assert_eq!(session_status(true, w, at(12, 0)), SessionStatus::Attended);
    }

    #[test]
    fn unmarked_session_after_window_is_missed() {
        let w = window();
        assert_eq!(session_status(false, w, at(11, 1)), SessionStatus::Missed);
    }
}
