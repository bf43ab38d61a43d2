use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, TimeZone};
use tracing::{error, info, warn};

use crate::{CircularsDesk, RefreshOutcome};

/// Longest local-clock gap a transition can open.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Next local `hour:00:00` strictly after `now` in the same time zone.
///
/// A wall time skipped by a clock change resolves to the first valid instant
/// after it. A repeated wall time resolves to its earlier occurrence.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    let tz = now.timezone();
    let mut date = now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = resolve_local(&tz, date.and_time(time)) {
            if candidate > *now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    (0..=MAX_GAP_MINUTES).find_map(|minutes| {
        tz.from_local_datetime(&(local + ChronoDuration::minutes(minutes)))
            .earliest()
    })
}

/// Refreshes the circulars index every day at `hour` local time. Never returns
/// unless `hour` is out of range.
pub async fn run_daily(desk: &CircularsDesk, hour: u32) -> anyhow::Result<()> {
    if hour > 23 {
        anyhow::bail!("invalid scrape hour {hour}");
    }

    loop {
        let now = Local::now();
        let next = match next_run_after(&now, hour) {
            Some(next) => next,
            None => {
                warn!(hour, "no local run time found, retrying in an hour");
                now + ChronoDuration::hours(1)
            }
        };
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(next_run = %next, "circulars refresh scheduled");
        tokio::time::sleep(wait).await;

        match desk.refresh().await {
            Ok(RefreshOutcome::Reindexed(count)) => {
                info!(count, "scheduled refresh reindexed circulars")
            }
            Ok(outcome) => warn!(?outcome, "scheduled refresh made no changes"),
            Err(err) => error!(error = %err, "scheduled circulars refresh failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, LocalResult, NaiveDate, Utc};

    use super::*;

    /// US Eastern time for 2025: EDT from 2025-03-09 07:00 UTC to 2025-11-02 06:00 UTC.
    #[derive(Debug, Clone, Copy)]
    struct Eastern;

    fn est() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn edt() -> FixedOffset {
        FixedOffset::west_opt(4 * 3600).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    impl TimeZone for Eastern {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            Eastern
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let fits = |offset: FixedOffset| {
                let instant = *local - ChronoDuration::seconds(offset.local_minus_utc().into());
                self.offset_from_utc_datetime(&instant) == offset
            };
            match (fits(edt()), fits(est())) {
                (true, true) => LocalResult::Ambiguous(edt(), est()),
                (true, false) => LocalResult::Single(edt()),
                (false, true) => LocalResult::Single(est()),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, instant: &NaiveDateTime) -> FixedOffset {
            if *instant >= utc(2025, 3, 9, 7) && *instant < utc(2025, 11, 2, 6) {
                edt()
            } else {
                est()
            }
        }
    }

    fn eastern(m: u32, d: u32, h: u32, min: u32) -> DateTime<Eastern> {
        Eastern.with_ymd_and_hms(2025, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn runs_later_today_when_hour_not_reached() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 30, 0).unwrap();
        let next = next_run_after(&now, 2).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 2, 0, 0).unwrap());
    }

    #[test]
    fn rolls_over_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 2, 0, 0).unwrap();
        let next = next_run_after(&now, 2).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 11, 2, 0, 0).unwrap());
    }

    #[test]
    fn rejects_invalid_hour() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 2, 0, 0).unwrap();
        assert!(next_run_after(&now, 24).is_none());
    }

    #[test]
    fn keeps_scheduling_after_spring_forward() {
        let next = next_run_after(&eastern(3, 9, 3, 30), 2).unwrap();
        assert_eq!(next, eastern(3, 10, 2, 0));
        assert_eq!(next.offset(), &edt());
    }

    #[test]
    fn skipped_hour_moves_to_first_valid_instant() {
        let next = next_run_after(&eastern(3, 9, 0, 30), 2).unwrap();
        assert_eq!(next, eastern(3, 9, 3, 0));

        let next = next_run_after(&eastern(3, 8, 2, 30), 2).unwrap();
        assert_eq!(next, eastern(3, 9, 3, 0));
    }

    #[test]
    fn keeps_local_hour_across_fall_back() {
        let next = next_run_after(&eastern(11, 1, 12, 0), 9).unwrap();
        assert_eq!(next, eastern(11, 2, 9, 0));
        assert_eq!(next.offset(), &est());
    }

    #[test]
    fn repeated_hour_uses_earlier_occurrence() {
        let next = next_run_after(&eastern(11, 2, 0, 30), 1).unwrap();
        assert_eq!(next.offset(), &edt());
        assert_eq!(next.naive_utc(), utc(2025, 11, 2, 5));
    }
}
