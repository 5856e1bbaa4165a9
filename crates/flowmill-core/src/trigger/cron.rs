//! Minimal five-field cron expressions.
//!
//! Format: `minute hour day-of-month month day-of-week`, each field either
//! `*` (wildcard) or a single integer in range. Day-of-week counts Sunday
//! as 0. The dialect is intentionally minimal and can be extended later.
//!
//! `next_fire` searches forward in one-minute steps against the platform's
//! local broken-down time, which is enough for "once per minute/hour/day"
//! patterns and keeps DST handling in chrono's hands.

use chrono::{DateTime, Datelike, Duration, Local, Timelike};

use super::TriggerError;

/// Search horizon: one year of minutes.
const MAX_SEARCH_MINUTES: i64 = 60 * 24 * 366;

/// A parsed cron expression. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronExpression {
    minute: Option<u32>,
    hour: Option<u32>,
    day_of_month: Option<u32>,
    month: Option<u32>,
    day_of_week: Option<u32>,
}

impl CronExpression {
    /// Parse five whitespace-separated fields.
    pub fn parse(expression: &str) -> Result<Self, TriggerError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(TriggerError::InvalidExpression(format!(
                "expected 5 fields, got {} in '{expression}'",
                fields.len()
            )));
        }

        Ok(Self {
            minute: parse_field(fields[0], 0, 59, expression)?,
            hour: parse_field(fields[1], 0, 23, expression)?,
            day_of_month: parse_field(fields[2], 1, 31, expression)?,
            month: parse_field(fields[3], 1, 12, expression)?,
            day_of_week: parse_field(fields[4], 0, 6, expression)?,
        })
    }

    /// The first minute strictly after `reference` whose local broken-down
    /// time matches every present field.
    ///
    /// If no match exists within a year, returns `reference` itself; the
    /// caller treats that as effectively disabled for this cycle.
    pub fn next_fire(&self, reference: DateTime<Local>) -> DateTime<Local> {
        let mut candidate = reference + Duration::minutes(1);

        for _ in 0..MAX_SEARCH_MINUTES {
            if self.matches(candidate) {
                return candidate;
            }
            candidate = candidate + Duration::minutes(1);
        }

        tracing::warn!("no cron match found within one year, treating as disabled");
        reference
    }

    fn matches(&self, at: DateTime<Local>) -> bool {
        if let Some(minute) = self.minute
            && at.minute() != minute
        {
            return false;
        }
        if let Some(hour) = self.hour
            && at.hour() != hour
        {
            return false;
        }
        if let Some(day_of_month) = self.day_of_month
            && at.day() != day_of_month
        {
            return false;
        }
        if let Some(month) = self.month
            && at.month() != month
        {
            return false;
        }
        if let Some(day_of_week) = self.day_of_week
            && at.weekday().num_days_from_sunday() != day_of_week
        {
            return false;
        }
        true
    }
}

fn parse_field(
    field: &str,
    min: u32,
    max: u32,
    expression: &str,
) -> Result<Option<u32>, TriggerError> {
    if field == "*" {
        return Ok(None);
    }

    let value: u32 = field.parse().map_err(|_| {
        TriggerError::InvalidExpression(format!("invalid field '{field}' in '{expression}'"))
    })?;

    if value < min || value > max {
        return Err(TriggerError::InvalidExpression(format!(
            "field '{field}' out of range {min}..={max} in '{expression}'"
        )));
    }

    Ok(Some(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
