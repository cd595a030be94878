use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate, NaiveDateTime};

const EXECUTION_FORMAT: &str = "%d/%b/%y %I:%M %p";
const DAY_FORMAT: &str = "%-d/%b/%y";

/// Parses Zephyr execution dates such as `5/Jan/24 02:30 PM`, `Today 02:30 PM`
/// or `Yesterday 09:00 AM`, relative to a fixed reference day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZephyrDateParser {
    reference: NaiveDate,
}

impl ZephyrDateParser {
    pub fn new(reference: NaiveDate) -> Self {
        Self { reference }
    }

    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn parse(&self, date: &str) -> Result<NaiveDateTime> {
        let expanded = self.expand_relative_day(date.trim());
        NaiveDateTime::parse_from_str(&expanded, EXECUTION_FORMAT)
            .with_context(|| format!("invalid zephyr execution date '{date}'"))
    }

    fn expand_relative_day(&self, date: &str) -> String {
        if date.contains("Today") {
            return date.replace("Today", &self.format_day(self.reference));
        }
        if date.contains("Yesterday") {
            let yesterday = self
                .reference
                .checked_sub_days(Days::new(1))
                .unwrap_or(self.reference);
            return date.replace("Yesterday", &self.format_day(yesterday));
        }
        date.to_string()
    }

    fn format_day(&self, day: NaiveDate) -> String {
        day.format(DAY_FORMAT).to_string()
    }
}
