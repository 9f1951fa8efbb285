//! Post addressing: the publish day plus slug that identifies a post publicly.

use std::fmt;

use chrono_tz::Tz;
use serde::Serialize;
use time::{Date, Month, OffsetDateTime};

use crate::domain::error::DomainError;
use crate::util::timezone::{TimezoneError, localized_date};

/// Calendar day, in the site timezone, on which a post is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PublishDay {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl PublishDay {
    pub fn new(year: i32, month: u8, day: u8) -> Result<Self, DomainError> {
        let parsed_month = Month::try_from(month)
            .map_err(|_| DomainError::validation(format!("month `{month}` is out of range")))?;
        Date::from_calendar_date(year, parsed_month, day).map_err(|_| {
            DomainError::validation(format!("`{year}-{month}-{day}` is not a calendar date"))
        })?;
        Ok(Self { year, month, day })
    }

    pub fn from_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
            day: date.day(),
        }
    }

    pub fn of(publish: OffsetDateTime, tz: Tz) -> Result<Self, TimezoneError> {
        localized_date(publish, tz).map(Self::from_date)
    }

    pub fn date(&self) -> Result<Date, DomainError> {
        let month = Month::try_from(self.month)
            .map_err(|_| DomainError::validation(format!("month `{}` is out of range", self.month)))?;
        Date::from_calendar_date(self.year, month, self.day)
            .map_err(|_| DomainError::validation(format!("`{self}` is not a calendar date")))
    }

    /// Canonical public path of a post published on this day.
    pub fn post_path(&self, slug: &str) -> String {
        format!(
            "/posts/{:04}/{:02}/{:02}/{slug}",
            self.year, self.month, self.day
        )
    }
}

impl fmt::Display for PublishDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}
