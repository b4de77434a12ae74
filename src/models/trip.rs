use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub user_uuid: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Zero-padded `YYYY-MM-DD`, compared as a plain string.
    pub date: String,
    #[serde(default)]
    pub location: String,
}

impl Trip {
    pub fn new(user_uuid: impl Into<String>, draft: TripDraft) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_uuid: user_uuid.into(),
            title: draft.title,
            description: draft.description,
            date: draft.date,
            location: draft.location,
        }
    }

    /// Overwrites the editable fields; `id` and owner stay as they are.
    pub fn apply(&mut self, draft: TripDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.date = draft.date;
        self.location = draft.location;
    }

    pub fn year(&self) -> &str {
        self.date.get(..4).unwrap_or("")
    }

    pub fn location_display(&self) -> &str {
        if self.location.is_empty() {
            "–"
        } else {
            &self.location
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TripDraft {
    pub title: String,
    pub description: String,
    pub date: String,
    #[serde(default)]
    pub location: String,
}

impl TripDraft {
    pub fn from_trip(trip: &Trip) -> Self {
        Self {
            title: trip.title.clone(),
            description: trip.description.clone(),
            date: trip.date.clone(),
            location: trip.location.clone(),
        }
    }

    /// Trims every field and checks the required ones.
    pub fn validate(self) -> Result<Self, AppError> {
        let draft = Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            date: self.date.trim().to_string(),
            location: self.location.trim().to_string(),
        };

        if draft.title.is_empty() {
            return Err(AppError::bad_request("Please enter a title."));
        }
        if draft.description.is_empty() {
            return Err(AppError::bad_request("Please enter a description."));
        }
        if draft.date.is_empty() {
            return Err(AppError::bad_request("Please enter a date."));
        }
        if !is_iso_date(&draft.date) {
            return Err(AppError::bad_request(
                "The date must be a valid date written as YYYY-MM-DD.",
            ));
        }

        Ok(draft)
    }
}

/// Accepts only zero-padded calendar dates so that string order is date order.
pub fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str, description: &str, date: &str) -> TripDraft {
        TripDraft {
            title: title.into(),
            description: description.into(),
            date: date.into(),
            location: "  Goa ".into(),
        }
    }

    #[test]
    fn validate_trims_fields() {
        let valid = draft(" Beach ", " Sun and sand ", "2025-06-20 ")
            .validate()
            .expect("valid draft");
        assert_eq!(valid.title, "Beach");
        assert_eq!(valid.description, "Sun and sand");
        assert_eq!(valid.date, "2025-06-20");
        assert_eq!(valid.location, "Goa");
    }

    #[test]
    fn validate_rejects_missing_fields() {
        assert!(matches!(
            draft("  ", "x", "2025-06-20").validate(),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            draft("x", "", "2025-06-20").validate(),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            draft("x", "y", "").validate(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn only_zero_padded_dates_are_accepted() {
        assert!(is_iso_date("2025-01-01"));
        assert!(!is_iso_date("2025-1-1"));
        assert!(!is_iso_date("2025-02-30"));
        assert!(!is_iso_date("20/06/2025"));
    }

    #[test]
    fn apply_keeps_identity() {
        let mut trip = Trip::new("user-1", draft("A", "B", "2025-06-20"));
        let id = trip.id.clone();
        trip.apply(draft("C", "D", "2024-01-02"));
        assert_eq!(trip.id, id);
        assert_eq!(trip.user_uuid, "user-1");
        assert_eq!(trip.title, "C");
        assert_eq!(trip.year(), "2024");
    }
}
