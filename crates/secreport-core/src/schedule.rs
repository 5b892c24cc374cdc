//! Schedule records as persisted by the administrative UI.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SecReportError};

/// Configuration-store key holding the JSON array of schedule records.
pub const SCHEDULE_CONFIGS_KEY: &str = "schedule_configs";

/// How often a schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        })
    }
}

/// Hour and minute in the reporting timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl FromStr for TimeOfDay {
    type Err = SecReportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SecReportError::InvalidSchedule(format!("time '{s}' is not HH:MM"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

/// One recurring report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub id: String,
    /// Tenant identifier.
    pub client: String,
    pub frequency: Frequency,
    /// Weekday (1 = Sunday … 7 = Saturday) or day of month. Ignored for daily.
    #[serde(default = "default_day", deserialize_with = "day_or_unset")]
    pub day: u32,
    /// `HH:MM`.
    pub time: String,
    /// Comma-separated addresses.
    #[serde(default)]
    pub recipients: String,
    #[serde(default)]
    pub is_enabled: bool,
}

fn default_day() -> u32 { 1 }

/// A cleared day field arrives as `null`; read it as 0 so validation
/// rejects it for weekly and monthly records.
fn day_or_unset<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(d)?.unwrap_or(0))
}

impl ScheduleRecord {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SecReportError::InvalidSchedule("id is empty".into()));
        }
        if self.client.trim().is_empty() {
            return Err(SecReportError::InvalidSchedule(format!(
                "schedule {} has no client",
                self.id
            )));
        }
        self.time_of_day()?;
        match self.frequency {
            Frequency::Daily => {}
            Frequency::Weekly if !(1..=7).contains(&self.day) => {
                return Err(SecReportError::InvalidSchedule(format!(
                    "schedule {}: weekday {} outside 1-7",
                    self.id, self.day
                )));
            }
            Frequency::Monthly if !(1..=31).contains(&self.day) => {
                return Err(SecReportError::InvalidSchedule(format!(
                    "schedule {}: day of month {} outside 1-31",
                    self.id, self.day
                )));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn time_of_day(&self) -> Result<TimeOfDay> {
        self.time.parse()
    }

    /// Recipients split on commas, trimmed, blanks dropped.
    pub fn recipient_list(&self) -> Vec<String> {
        split_recipients(&self.recipients)
    }

    /// Scheduler job name for this record.
    pub fn job_name(&self) -> String {
        format!("report-{}", self.id)
    }
}

pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frequency: Frequency, day: u32, time: &str) -> ScheduleRecord {
        ScheduleRecord {
            id: "1".into(),
            client: "ACME".into(),
            frequency,
            day,
            time: time.into(),
            recipients: "a@x.com, b@x.com".into(),
            is_enabled: true,
        }
    }

    #[test]
    fn test_parse_ui_json() {
        let json = r#"[{"id":"1717000000000","client":"ACME","frequency":"weekly","day":2,
            "time":"09:30","recipients":"soc@acme.com","isEnabled":true}]"#;
        let records: Vec<ScheduleRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].frequency, Frequency::Weekly);
        assert_eq!(records[0].day, 2);
        assert!(records[0].is_enabled);
        assert_eq!(records[0].job_name(), "report-1717000000000");

        let back = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(back["isEnabled"], true);
    }

    #[test]
    fn test_null_day_parses_but_fails_validation() {
        let json = r#"{"id":"2","client":"GUIDONI","frequency":"monthly","day":null,
            "time":"08:00","recipients":"soc@guidoni.com","isEnabled":true}"#;
        let record: ScheduleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.day, 0);
        assert!(record.validate().is_err());

        let missing: ScheduleRecord =
            serde_json::from_str(r#"{"id":"3","client":"ACME","frequency":"daily","time":"08:00"}"#)
                .unwrap();
        assert_eq!(missing.day, 1);
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(
            "09:05".parse::<TimeOfDay>().unwrap(),
            TimeOfDay { hour: 9, minute: 5 }
        );
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_validate_day_ranges() {
        assert!(record(Frequency::Daily, 99, "09:00").validate().is_ok());
        assert!(record(Frequency::Weekly, 7, "09:00").validate().is_ok());
        assert!(record(Frequency::Weekly, 8, "09:00").validate().is_err());
        assert!(record(Frequency::Monthly, 31, "09:00").validate().is_ok());
        assert!(record(Frequency::Monthly, 0, "09:00").validate().is_err());
        assert!(record(Frequency::Daily, 1, "9h").validate().is_err());
    }

    #[test]
    fn test_recipient_list() {
        let mut r = record(Frequency::Daily, 1, "09:00");
        assert_eq!(r.recipient_list(), vec!["a@x.com", "b@x.com"]);
        r.recipients = " , ".into();
        assert!(r.recipient_list().is_empty());
    }
}
