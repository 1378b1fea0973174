//! Source of "today" for due-date classification.

use chrono::{Local, NaiveDate};

/// Provides the current calendar day.
///
/// Derivation takes the day as an input so the same state always yields the same list;
/// tests substitute [`FixedClock`].
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar day of the machine running the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
