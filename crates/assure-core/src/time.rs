//! Asia/Singapore has held a fixed UTC+8 offset with no daylight saving
//! since 1982, so a `FixedOffset` represents it exactly — no IANA tzdata
//! dependency needed for this one zone.

use chrono::{DateTime, FixedOffset, Utc};

pub const SINGAPORE_OFFSET_SECONDS: i32 = 8 * 3600;

pub fn singapore_offset() -> FixedOffset {
    FixedOffset::east_opt(SINGAPORE_OFFSET_SECONDS).expect("valid fixed offset")
}

/// Current time in Asia/Singapore.
pub fn now_sgt() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&singapore_offset())
}

/// Three rotating time-of-day salutations, matching the greeting templates.
pub fn salutation(now: DateTime<FixedOffset>) -> &'static str {
    match now.hour_12_or_24() {
        h if h < 12 => "Good morning",
        h if h < 18 => "Good afternoon",
        _ => "Good evening",
    }
}

trait HourExt {
    fn hour_12_or_24(&self) -> u32;
}

impl HourExt for DateTime<FixedOffset> {
    fn hour_12_or_24(&self) -> u32 {
        use chrono::Timelike;
        self.hour()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn salutation_boundaries() {
        let offset = singapore_offset();
        let morning = offset.with_ymd_and_hms(2026, 7, 30, 9, 0, 0).unwrap();
        let afternoon = offset.with_ymd_and_hms(2026, 7, 30, 14, 0, 0).unwrap();
        let evening = offset.with_ymd_and_hms(2026, 7, 30, 20, 0, 0).unwrap();
        assert_eq!(salutation(morning), "Good morning");
        assert_eq!(salutation(afternoon), "Good afternoon");
        assert_eq!(salutation(evening), "Good evening");
    }

    #[test]
    fn offset_is_fixed_eight_hours() {
        assert_eq!(singapore_offset().local_minus_utc(), 8 * 3600);
    }
}
