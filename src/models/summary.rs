use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::AppError;

/// `year -> free text` for one user.
pub type SummaryMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearSummary {
    pub year: String,
    pub text: String,
}

impl YearSummary {
    /// Newest year first.
    pub fn list_from(map: SummaryMap) -> Vec<YearSummary> {
        map.into_iter()
            .rev()
            .map(|(year, text)| YearSummary { year, text })
            .collect()
    }
}

pub fn validate_year(year: &str) -> Result<&str, AppError> {
    if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
        Ok(year)
    } else {
        Err(AppError::bad_request("A year must be four digits, e.g. 2025."))
    }
}
