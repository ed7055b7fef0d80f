//! Due-date arithmetic for reminders.
//!
//! All arithmetic is performed in UTC; the configured time of day is
//! interpreted as wall-clock UTC.

use std::collections::HashMap;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::ReminderError;
use crate::rules::schema::ReminderTemplate;

/// Computes a reminder's due instant from an extracted date.
///
/// `days_before` days are subtracted from the extracted date and the
/// wall-clock time is set to `time_of_day`. An instant at or before `now` is
/// clamped forward to tomorrow at `time_of_day` so a past-due reminder is
/// never created.
pub fn compute_due_date(
    extracted: DateTime<Utc>,
    days_before: i64,
    time_of_day: NaiveTime,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let target = extracted - Duration::days(days_before);
    let due = target.date_naive().and_time(time_of_day).and_utc();

    if due <= now {
        (now.date_naive() + Days::new(1))
            .and_time(time_of_day)
            .and_utc()
    } else {
        due
    }
}

/// Parses a wall-clock time of day, `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ReminderError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ReminderError::InvalidTimeOfDay(value.to_string()))
}

/// Parses a date from an extracted field value.
///
/// Accepts RFC 3339 instants and the bare date formats `YYYY-MM-DD`,
/// `DD/MM/YYYY` and `DD-MM-YYYY`; bare dates resolve to midnight UTC.
pub fn parse_extracted_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.and_time(NaiveTime::MIN).and_utc());
        }
    }

    None
}

/// Finds the extracted date a reminder should be anchored on.
///
/// When the template names a `dueDateField` only that field is consulted;
/// otherwise the first parseable field value wins. Returns `None` when no
/// extractable date exists, in which case the reminder is created without a
/// due date.
pub fn due_date_from_fields(
    fields: &HashMap<String, String>,
    template: &ReminderTemplate,
) -> Option<DateTime<Utc>> {
    if let Some(field) = &template.due_date_field {
        return fields.get(field).and_then(|v| parse_extracted_date(v));
    }

    fields.values().find_map(|v| parse_extracted_date(v))
}
