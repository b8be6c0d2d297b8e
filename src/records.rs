use chrono::{Local, NaiveDate};
use serde::Serialize;

pub const STATUS_APPLIED: &str = "Applied";
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Column names written when a store is empty.
pub const HEADER: [&str; 5] = ["Company", "Job Title", "Status", "Date Applied", "URL"];

/// One row of the tracker. Position in the store is its only identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRecord {
    pub company: String,
    pub title: String,
    pub status: String,
    pub date_applied: String,
    pub url: String,
}

impl ApplicationRecord {
    pub fn applied(company: String, title: String, url: String) -> Self {
        Self::applied_on(company, title, url, Local::now().date_naive())
    }

    pub fn applied_on(company: String, title: String, url: String, date: NaiveDate) -> Self {
        Self {
            company,
            title,
            status: STATUS_APPLIED.to_string(),
            date_applied: date.format(DATE_FORMAT).to_string(),
            url,
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.company.clone(),
            self.title.clone(),
            self.status.clone(),
            self.date_applied.clone(),
            self.url.clone(),
        ]
    }
}

/// Point-in-time read of the store: header plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetSnapshot {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetSnapshot {
    /// Splits a raw store read, treating row 0 as the header.
    pub fn from_raw(mut raw: Vec<Vec<String>>) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        let rows = raw.split_off(1);
        let header = raw.pop().unwrap_or_default();
        Self { header, rows }
    }

    pub fn new<H, R>(header: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator,
        <R::Item as IntoIterator>::Item: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Number of raw rows the store held, header included.
    pub fn raw_len(&self) -> usize {
        if self.header.is_empty() && self.rows.is_empty() {
            0
        } else {
            1 + self.rows.len()
        }
    }
}
