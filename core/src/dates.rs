//! Calendar helpers. Apart from [`today`], every function takes the reference
//! date or instant as an argument.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Utc};

use crate::models::{ExpiryStatus, Language};

/// Days remaining before which a food counts as expiring soon.
pub const WARNING_DAYS: i64 = 3;

/// The local calendar date.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[must_use]
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[must_use]
pub fn days_until_expiry(expiry: NaiveDate, today: NaiveDate) -> i64 {
    days_between(today, expiry)
}

/// `>3` days left is fresh, `0..=3` is warning, negative is expired.
#[must_use]
pub fn expiry_status(expiry: NaiveDate, today: NaiveDate) -> ExpiryStatus {
    let days = days_until_expiry(expiry, today);
    if days < 0 {
        ExpiryStatus::Expired
    } else if days <= WARNING_DAYS {
        ExpiryStatus::Warning
    } else {
        ExpiryStatus::Fresh
    }
}

#[must_use]
pub fn format_expiry(expiry: NaiveDate, today: NaiveDate, language: Language) -> String {
    let days = days_until_expiry(expiry, today);
    match language {
        Language::EnUs => match days {
            d if d < 0 => format!("Expired {} {} ago", -d, plural_days(-d)),
            0 => "Expires today".to_string(),
            1 => "Expires tomorrow".to_string(),
            d => format!("Expires in {d} days"),
        },
        Language::ZhCn => match days {
            d if d < 0 => format!("已过期 {} 天", -d),
            0 => "今天过期".to_string(),
            1 => "明天过期".to_string(),
            d => format!("{d} 天后过期"),
        },
    }
}

/// Today/tomorrow/yesterday, then relative days within a week, then the date.
#[must_use]
pub fn format_relative_date(date: NaiveDate, today: NaiveDate, language: Language) -> String {
    let diff = days_between(today, date);
    match language {
        Language::EnUs => match diff {
            0 => "Today".to_string(),
            1 => "Tomorrow".to_string(),
            -1 => "Yesterday".to_string(),
            2..=7 => format!("In {diff} days"),
            -7..=-2 => format!("{} days ago", -diff),
            _ => date.format("%Y-%m-%d").to_string(),
        },
        Language::ZhCn => match diff {
            0 => "今天".to_string(),
            1 => "明天".to_string(),
            -1 => "昨天".to_string(),
            2..=7 => format!("{diff}天后"),
            -7..=-2 => format!("{}天前", -diff),
            _ => date.format("%Y/%-m/%-d").to_string(),
        },
    }
}

/// Coarse "time ago" description of a past instant.
#[must_use]
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>, language: Language) -> String {
    let elapsed = now - then;
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    match language {
        Language::EnUs => {
            if minutes < 1 {
                "just now".to_string()
            } else if minutes < 60 {
                format!("{minutes} min ago")
            } else if hours < 24 {
                format!("{hours} h ago")
            } else if days < 7 {
                format!("{days} {} ago", plural_days(days))
            } else {
                format_relative_date(then.date_naive(), now.date_naive(), language)
            }
        }
        Language::ZhCn => {
            if minutes < 1 {
                "刚刚".to_string()
            } else if minutes < 60 {
                format!("{minutes}分钟前")
            } else if hours < 24 {
                format!("{hours}小时前")
            } else if days < 7 {
                format!("{days}天前")
            } else {
                format_relative_date(then.date_naive(), now.date_naive(), language)
            }
        }
    }
}

fn plural_days(n: i64) -> &'static str {
    if n == 1 { "day" } else { "days" }
}

/// `None` when the result falls outside the calendar chrono can represent.
#[must_use]
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

/// Monday of the week containing `date`.
#[must_use]
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let offset = i64::from(date.weekday().num_days_from_monday());
    date.checked_sub_signed(Duration::days(offset)).unwrap_or(date)
}

#[must_use]
pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Inclusive range; empty when `start > end`.
#[must_use]
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// True when `date` falls between today and `days` from now, inclusive.
#[must_use]
pub fn is_within_days(date: NaiveDate, today: NaiveDate, days: i64) -> bool {
    let diff = days_between(today, date);
    (0..=days).contains(&diff)
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps, or a naive `YYYY-MM-DDTHH:MM:SS`.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

/// Serde adapter: reads any format `parse_date` accepts.
pub mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_expiry_status_thresholds() {
        let today = d(2024, 6, 10);
        assert_eq!(expiry_status(d(2024, 6, 14), today), ExpiryStatus::Fresh);
        assert_eq!(expiry_status(d(2024, 6, 13), today), ExpiryStatus::Warning);
        assert_eq!(expiry_status(d(2024, 6, 10), today), ExpiryStatus::Warning);
        assert_eq!(expiry_status(d(2024, 6, 9), today), ExpiryStatus::Expired);
    }

    #[test]
    fn test_days_between_signed() {
        assert_eq!(days_between(d(2024, 6, 10), d(2024, 6, 1)), -9);
        assert_eq!(days_until_expiry(d(2024, 3, 1), d(2024, 2, 28)), 2);
    }

    #[test]
    fn test_format_expiry_english() {
        let today = d(2024, 6, 10);
        assert_eq!(format_expiry(d(2024, 6, 8), today, Language::EnUs), "Expired 2 days ago");
        assert_eq!(format_expiry(d(2024, 6, 9), today, Language::EnUs), "Expired 1 day ago");
        assert_eq!(format_expiry(today, today, Language::EnUs), "Expires today");
        assert_eq!(format_expiry(d(2024, 6, 11), today, Language::EnUs), "Expires tomorrow");
        assert_eq!(format_expiry(d(2024, 6, 15), today, Language::EnUs), "Expires in 5 days");
    }

    #[test]
    fn test_format_expiry_chinese() {
        let today = d(2024, 6, 10);
        assert_eq!(format_expiry(d(2024, 6, 7), today, Language::ZhCn), "已过期 3 天");
        assert_eq!(format_expiry(today, today, Language::ZhCn), "今天过期");
        assert_eq!(format_expiry(d(2024, 6, 11), today, Language::ZhCn), "明天过期");
        assert_eq!(format_expiry(d(2024, 6, 20), today, Language::ZhCn), "10 天后过期");
    }

    #[test]
    fn test_format_relative_date() {
        let today = d(2024, 6, 10);
        assert_eq!(format_relative_date(today, today, Language::ZhCn), "今天");
        assert_eq!(format_relative_date(d(2024, 6, 9), today, Language::ZhCn), "昨天");
        assert_eq!(format_relative_date(d(2024, 6, 15), today, Language::ZhCn), "5天后");
        assert_eq!(format_relative_date(d(2024, 6, 4), today, Language::ZhCn), "6天前");
        assert_eq!(format_relative_date(d(2024, 7, 1), today, Language::ZhCn), "2024/7/1");
        assert_eq!(format_relative_date(d(2024, 6, 11), today, Language::EnUs), "Tomorrow");
        assert_eq!(format_relative_date(d(2024, 5, 1), today, Language::EnUs), "2024-05-01");
    }

    #[test]
    fn test_relative_time() {
        let now = DateTime::parse_from_rfc3339("2024-06-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(relative_time(now, now, Language::EnUs), "just now");
        assert_eq!(
            relative_time(now - Duration::minutes(5), now, Language::EnUs),
            "5 min ago"
        );
        assert_eq!(
            relative_time(now - Duration::hours(3), now, Language::ZhCn),
            "3小时前"
        );
        assert_eq!(
            relative_time(now - Duration::days(2), now, Language::EnUs),
            "2 days ago"
        );
        assert_eq!(
            relative_time(now - Duration::days(30), now, Language::EnUs),
            "2024-05-11"
        );
    }

    #[test]
    fn test_week_and_month_starts() {
        // 2024-06-12 is a Wednesday
        assert_eq!(start_of_week(d(2024, 6, 12)), d(2024, 6, 10));
        assert_eq!(start_of_week(d(2024, 6, 16)), d(2024, 6, 10));
        assert_eq!(start_of_week(d(2024, 6, 10)), d(2024, 6, 10));
        assert_eq!(start_of_month(d(2024, 6, 12)), d(2024, 6, 1));
    }

    #[test]
    fn test_date_range_inclusive() {
        let range = date_range(d(2024, 2, 27), d(2024, 3, 1));
        assert_eq!(range.len(), 4);
        assert_eq!(range[2], d(2024, 2, 29));
        assert!(date_range(d(2024, 3, 2), d(2024, 3, 1)).is_empty());
    }

    #[test]
    fn test_is_within_days() {
        let today = d(2024, 6, 10);
        assert!(is_within_days(today, today, 3));
        assert!(is_within_days(d(2024, 6, 13), today, 3));
        assert!(!is_within_days(d(2024, 6, 14), today, 3));
        assert!(!is_within_days(d(2024, 6, 9), today, 3));
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-06-10"), Some(d(2024, 6, 10)));
        assert_eq!(parse_date("2024-06-10T23:30:00.000Z"), Some(d(2024, 6, 10)));
        assert_eq!(parse_date("2024-06-10T08:00:00"), Some(d(2024, 6, 10)));
        assert_eq!(parse_date("June 10"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_add_days() {
        assert_eq!(add_days(d(2024, 12, 30), 3), Some(d(2025, 1, 2)));
        assert_eq!(add_days(d(2024, 1, 1), -1), Some(d(2023, 12, 31)));
    }

    #[test]
    fn test_add_days_out_of_range() {
        assert_eq!(add_days(NaiveDate::MAX, 1), None);
        assert_eq!(add_days(NaiveDate::MIN, -1), None);
        assert_eq!(add_days(d(2024, 1, 1), i64::from(u32::MAX)), None);
        assert_eq!(add_days(d(2024, 1, 1), i64::MAX), None);
    }
}
