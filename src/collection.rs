//! Derived views over a snapshot of trips: the filtered/sorted list, yearly
//! statistics and the dashboard calendar. Everything here is pure.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::trip::{Trip, DATE_FORMAT};

pub const NO_LOCATION: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "Ascending",
            SortDirection::Descending => "Descending",
        }
    }
}

/// Title filter plus date ordering.
///
/// Descending is the ascending result reversed, so trips sharing a date come
/// out in mirrored input order rather than in input order.
pub fn select_trips(all_trips: &[Trip], search_query: &str, direction: SortDirection) -> Vec<Trip> {
    let needle = search_query.to_lowercase();
    let mut selected: Vec<Trip> = all_trips
        .iter()
        .filter(|trip| needle.is_empty() || trip.title.to_lowercase().contains(&needle))
        .cloned()
        .collect();

    selected.sort_by(|a, b| a.date.cmp(&b.date));
    if direction == SortDirection::Descending {
        selected.reverse();
    }
    selected
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearStats {
    pub year: String,
    pub count: usize,
    pub most_visited: String,
}

pub fn summarize_year(all_trips: &[Trip], year: &str) -> YearStats {
    let in_year: Vec<&Trip> = all_trips
        .iter()
        .filter(|trip| trip.date.starts_with(year))
        .collect();

    // (location, count) in order of first appearance
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for trip in &in_year {
        match tally.iter_mut().find(|(loc, _)| *loc == trip.location) {
            Some((_, count)) => *count += 1,
            None => tally.push((trip.location.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (location, count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((location, count));
        }
    }

    YearStats {
        year: year.to_string(),
        count: in_year.len(),
        most_visited: best
            .map(|(location, _)| location.to_string())
            .unwrap_or_else(|| NO_LOCATION.to_string()),
    }
}

/// Earliest trip by date string; the first one wins a tie.
pub fn next_trip(all_trips: &[Trip]) -> Option<&Trip> {
    all_trips.iter().fold(None, |best: Option<&Trip>, trip| match best {
        Some(current) if current.date <= trip.date => Some(current),
        _ => Some(trip),
    })
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month_key(key: &str) -> Option<NaiveDate> {
    let (year, month) = key.trim().split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub day: u32,
    pub has_trip: bool,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarMonth {
    pub label: String,
    /// Empty cells before the 1st in a Sunday-first week.
    pub leading_blanks: usize,
    pub days: Vec<CalendarDay>,
    pub prev_key: String,
    pub next_key: String,
}

impl CalendarMonth {
    pub fn build(year: i32, month: u32, today: NaiveDate, trips: &[Trip]) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_first = first.checked_add_months(Months::new(1))?;
        let prev_first = first.checked_sub_months(Months::new(1))?;

        let days = first
            .iter_days()
            .take_while(|date| *date < next_first)
            .map(|date| {
                let key = date.format(DATE_FORMAT).to_string();
                CalendarDay {
                    day: date.day(),
                    has_trip: trips.iter().any(|trip| trip.date == key),
                    is_today: date == today,
                }
            })
            .collect();

        Some(Self {
            label: first.format("%B %Y").to_string(),
            leading_blanks: first.weekday().num_days_from_sunday() as usize,
            days,
            prev_key: month_key(prev_first),
            next_key: month_key(next_first),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(id: &str, title: &str, date: &str, location: &str) -> Trip {
        Trip {
            id: id.into(),
            user_uuid: "u".into(),
            title: title.into(),
            description: String::new(),
            date: date.into(),
            location: location.into(),
        }
    }

    fn sample() -> Vec<Trip> {
        vec![
            trip("1", "Trip to Goa", "2025-06-20", "Goa"),
            trip("2", "Beach again", "2025-07-15", "Goa"),
            trip("3", "Mountains", "2025-01-01", "Manali"),
        ]
    }

    fn ids(trips: &[Trip]) -> Vec<&str> {
        trips.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        for query in ["goa", "GOA", "Goa", "gOa"] {
            let selected = select_trips(&sample(), query, SortDirection::Ascending);
            assert_eq!(ids(&selected), vec!["1"], "query {query}");
        }
    }

    #[test]
    fn empty_query_keeps_everything_sorted_by_date() {
        let selected = select_trips(&sample(), "", SortDirection::Ascending);
        assert_eq!(ids(&selected), vec!["3", "1", "2"]);
    }

    #[test]
    fn descending_mirrors_ascending_including_ties() {
        let trips = vec![
            trip("a", "one", "2024-05-01", "x"),
            trip("b", "two", "2024-05-01", "y"),
            trip("c", "three", "2023-01-01", "z"),
            trip("d", "four", "2024-05-01", "w"),
        ];
        let ascending = select_trips(&trips, "", SortDirection::Ascending);
        let descending = select_trips(&trips, "", SortDirection::Descending);

        assert_eq!(ids(&ascending), vec!["c", "a", "b", "d"]);
        let mut mirrored = ascending.clone();
        mirrored.reverse();
        assert_eq!(descending, mirrored);
        assert_eq!(ids(&descending), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn selection_is_repeatable() {
        let trips = sample();
        let first = select_trips(&trips, "a", SortDirection::Descending);
        let second = select_trips(&trips, "a", SortDirection::Descending);
        assert_eq!(first, second);
    }

    #[test]
    fn selection_only_returns_matching_inputs() {
        let trips = sample();
        for trip in select_trips(&trips, "ou", SortDirection::Ascending) {
            assert!(trips.contains(&trip));
            assert!(trip.title.to_lowercase().contains("ou"));
        }
    }

    #[test]
    fn summarize_counts_year_and_most_visited() {
        let stats = summarize_year(&sample(), "2025");
        assert_eq!(stats.count, 3);
        assert_eq!(stats.most_visited, "Goa");
    }

    #[test]
    fn summarize_empty_is_not_available() {
        let stats = summarize_year(&[], "2025");
        assert_eq!(stats.count, 0);
        assert_eq!(stats.most_visited, NO_LOCATION);

        let other_year = summarize_year(&sample(), "2019");
        assert_eq!(other_year.count, 0);
        assert_eq!(other_year.most_visited, NO_LOCATION);
    }

    #[test]
    fn summarize_tie_goes_to_first_seen_location() {
        let trips = vec![
            trip("1", "a", "2024-03-01", "Pune"),
            trip("2", "b", "2024-02-01", "Delhi"),
            trip("3", "c", "2024-04-01", "Delhi"),
            trip("4", "d", "2024-05-01", "Pune"),
        ];
        assert_eq!(summarize_year(&trips, "2024").most_visited, "Pune");
    }

    #[test]
    fn next_trip_is_earliest_date() {
        let trips = sample();
        assert_eq!(next_trip(&trips).map(|t| t.id.as_str()), Some("3"));
        assert!(next_trip(&[]).is_none());
    }

    #[test]
    fn month_keys_round_trip() {
        let date = parse_month_key("2025-06").expect("month");
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 1).expect("date"));
        assert_eq!(month_key(date), "2025-06");
        assert!(parse_month_key("2025-13").is_none());
        assert!(parse_month_key("2025-6").is_none());
        assert!(parse_month_key("junk").is_none());
    }

    #[test]
    fn calendar_marks_trip_days_and_today() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 3).expect("today");
        let month = CalendarMonth::build(2025, 6, today, &sample()).expect("calendar");

        assert_eq!(month.label, "June 2025");
        // 2025-06-01 is a Sunday
        assert_eq!(month.leading_blanks, 0);
        assert_eq!(month.days.len(), 30);
        assert!(month.days[19].has_trip);
        assert!(month.days[2].is_today);
        assert_eq!(month.days.iter().filter(|d| d.has_trip).count(), 1);
        assert_eq!(month.prev_key, "2025-05");
        assert_eq!(month.next_key, "2025-07");
    }

    #[test]
    fn calendar_wraps_year_boundaries() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("today");
        let month = CalendarMonth::build(2024, 12, today, &[]).expect("calendar");
        assert_eq!(month.prev_key, "2024-11");
        assert_eq!(month.next_key, "2025-01");
        // 2024-12-01 is a Sunday too; February 2024 starts on a Thursday
        let feb = CalendarMonth::build(2024, 2, today, &[]).expect("calendar");
        assert_eq!(feb.leading_blanks, 4);
        assert_eq!(feb.days.len(), 29);
    }
}
