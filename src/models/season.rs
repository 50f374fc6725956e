use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A recurring window of whole months, e.g. Aug-Dec or Nov-Feb.
///
/// When `start_month > end_month` the window spans the year boundary.
/// A season instance is identified by the calendar year in which it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    start_month: u32,
    end_month: u32,
}

impl SeasonWindow {
    /// Both months must be in 1..=12
    pub fn new(start_month: u32, end_month: u32) -> Option<Self> {
        if (1..=12).contains(&start_month) && (1..=12).contains(&end_month) {
            Some(Self {
                start_month,
                end_month,
            })
        } else {
            None
        }
    }

    pub fn wraps_year(&self) -> bool {
        self.start_month > self.end_month
    }

    pub fn contains_month(&self, month: u32) -> bool {
        if self.wraps_year() {
            month >= self.start_month || month <= self.end_month
        } else {
            (self.start_month..=self.end_month).contains(&month)
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.contains_month(date.month())
    }

    /// Start year of the season instance `date` belongs to, if in-window
    pub fn season_year(&self, date: NaiveDate) -> Option<i32> {
        if !self.contains(date) {
            return None;
        }
        if self.wraps_year() && date.month() < self.start_month {
            Some(date.year() - 1)
        } else {
            Some(date.year())
        }
    }

    pub fn label(&self) -> String {
        format!("{}-{}", month_abbrev(self.start_month), month_abbrev(self.end_month))
    }
}

fn month_abbrev(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        _ => "Dec",
    }
}
