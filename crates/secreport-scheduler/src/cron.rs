//! Cron expressions for schedule records.
//! Six fields, `sec min hour dom month dow`; weekday 1 = Sunday … 7 = Saturday.

use chrono::{DateTime, FixedOffset};
use ::cron::Schedule;
use std::str::FromStr;

use secreport_core::{Frequency, Result, ScheduleRecord, SecReportError};

/// Derive the expression for a record. Always fires at second 0.
pub fn cron_expression(record: &ScheduleRecord) -> Result<String> {
    record.validate()?;
    let t = record.time_of_day()?;
    Ok(match record.frequency {
        Frequency::Daily => format!("0 {} {} * * *", t.minute, t.hour),
        Frequency::Weekly => format!("0 {} {} * * {}", t.minute, t.hour, record.day),
        Frequency::Monthly => format!("0 {} {} {} * *", t.minute, t.hour, record.day),
    })
}

pub fn parse(expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression)
        .map_err(|e| SecReportError::Scheduler(format!("Invalid cron expression '{expression}': {e}")))
}

/// Next firing strictly after `after`, in `after`'s offset.
pub fn next_fire(
    expression: &str,
    after: &DateTime<FixedOffset>,
) -> Result<Option<DateTime<FixedOffset>>> {
    Ok(parse(expression)?.after(after).next())
}
