use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use mockall::automock;

/// Source of the current instant.
#[automock]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The calendar day at `now` in `tz`.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// The hour of the day at `now` in `tz`.
pub fn local_hour(now: DateTime<Utc>, tz: Tz) -> u32 {
    now.with_timezone(&tz).hour()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_local_date_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 22, 30, 0).unwrap();

        assert_eq!(local_date(now, chrono_tz::UTC), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(
            local_date(now, chrono_tz::Europe::Moscow),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
        );
        assert_eq!(
            local_date(now, chrono_tz::America::New_York),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
    }

    #[test]
    fn test_local_hour() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap();

        assert_eq!(local_hour(now, chrono_tz::UTC), 6);
        assert_eq!(local_hour(now, chrono_tz::Europe::Berlin), 7);
    }
}
