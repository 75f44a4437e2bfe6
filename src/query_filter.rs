//! Selection of bookings for the administrator's booking table.
//!
//! Filtering is pure: the reference date and the first weekday are passed in,
//! so the same input always yields the same bookings in the same order.

use crate::types::Booking;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Upcoming,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    #[default]
    Day,
    Week,
    Month,
}

/// Text filters match case-insensitive substrings; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub scope: Scope,
    pub range: Range,
    pub name: String,
    pub service: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateBound {
    Any,
    On(NaiveDate),
    From(NaiveDate),
}

impl DateBound {
    fn new(scope: Scope, range: Range, today: NaiveDate, week_start: Weekday) -> Self {
        match (scope, range) {
            (Scope::All, _) => DateBound::Any,
            (Scope::Upcoming, Range::Day) => DateBound::On(today),
            (Scope::Upcoming, Range::Week) => DateBound::From(start_of_week(today, week_start)),
            (Scope::Upcoming, Range::Month) => DateBound::From(today.with_day(1).unwrap_or(today)),
        }
    }

    fn contains(&self, date: NaiveDate) -> bool {
        match self {
            DateBound::Any => true,
            DateBound::On(day) => date == *day,
            DateBound::From(first) => date >= *first,
        }
    }
}

pub fn start_of_week(today: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = (7 + today.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
    today - Duration::days(i64::from(offset))
}

fn matches_text(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(needle)
}

/// Returns the bookings selected by `criteria`, in input order.
pub fn filter<'a>(
    bookings: &'a [Booking],
    criteria: &FilterCriteria,
    today: NaiveDate,
    week_start: Weekday,
) -> impl Iterator<Item = &'a Booking> + Clone + 'a {
    let bound = DateBound::new(criteria.scope, criteria.range, today, week_start);
    let name = criteria.name.to_lowercase();
    let service = criteria.service.to_lowercase();
    let phone = criteria.phone.to_lowercase();
    let email = criteria.email.to_lowercase();

    bookings.iter().filter(move |booking| {
        bound.contains(booking.date)
            && matches_text(&booking.customer.name, &name)
            && matches_text(&booking.service, &service)
            && matches_text(&booking.customer.phone, &phone)
            && matches_text(&booking.customer.email, &email)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutils::{booking_for, date};

    fn bookings_on(dates: &[&str]) -> Vec<Booking> {
        dates
            .iter()
            .map(|day| booking_for(date(day), "09:00"))
            .collect()
    }

    fn selected_dates(
        bookings: &[Booking],
        criteria: &FilterCriteria,
        today: &str,
        week_start: Weekday,
    ) -> Vec<String> {
        filter(bookings, criteria, date(today), week_start)
            .map(|booking| booking.date.to_string())
            .collect()
    }

    #[test]
    fn test_upcoming_day_keeps_only_today() {
        let bookings = bookings_on(&["2024-04-30", "2024-05-01"]);
        let criteria = FilterCriteria {
            scope: Scope::Upcoming,
            range: Range::Day,
            ..Default::default()
        };
        assert_eq!(
            selected_dates(&bookings, &criteria, "2024-05-01", Weekday::Sun),
            vec!["2024-05-01"]
        );
    }

    // 2024-05-01 is a Wednesday.
    #[test_case::test_case(Scope::All, Range::Day, Weekday::Sun, &["2024-03-31", "2024-04-27", "2024-04-28", "2024-04-29", "2024-05-01", "2024-05-15"])]
    #[test_case::test_case(Scope::All, Range::Month, Weekday::Sun, &["2024-03-31", "2024-04-27", "2024-04-28", "2024-04-29", "2024-05-01", "2024-05-15"])]
    #[test_case::test_case(Scope::Upcoming, Range::Day, Weekday::Sun, &["2024-05-01"])]
    #[test_case::test_case(Scope::Upcoming, Range::Week, Weekday::Sun, &["2024-04-28", "2024-04-29", "2024-05-01", "2024-05-15"])]
    #[test_case::test_case(Scope::Upcoming, Range::Week, Weekday::Mon, &["2024-04-29", "2024-05-01", "2024-05-15"])]
    #[test_case::test_case(Scope::Upcoming, Range::Month, Weekday::Sun, &["2024-05-01", "2024-05-15"])]
    fn test_date_scope(scope: Scope, range: Range, week_start: Weekday, expected: &[&str]) {
        let bookings = bookings_on(&[
            "2024-03-31",
            "2024-04-27",
            "2024-04-28",
            "2024-04-29",
            "2024-05-01",
            "2024-05-15",
        ]);
        let criteria = FilterCriteria {
            scope,
            range,
            ..Default::default()
        };
        assert_eq!(
            selected_dates(&bookings, &criteria, "2024-05-01", week_start),
            expected
        );
    }

    #[test_case::test_case("2024-05-01", Weekday::Sun, "2024-04-28")]
    #[test_case::test_case("2024-04-28", Weekday::Sun, "2024-04-28")]
    #[test_case::test_case("2024-05-01", Weekday::Mon, "2024-04-29")]
    #[test_case::test_case("2024-04-28", Weekday::Mon, "2024-04-22")]
    #[test_case::test_case("2024-05-01", Weekday::Sat, "2024-04-27")]
    fn test_start_of_week(today: &str, week_start: Weekday, expected: &str) {
        assert_eq!(start_of_week(date(today), week_start), date(expected));
    }

    #[test]
    fn test_text_filters_are_case_insensitive_and_combined() {
        let mut bookings = bookings_on(&["2024-05-01", "2024-05-01", "2024-05-01"]);
        bookings[0].customer.name = "Jo Miller".into();
        bookings[0].service = "Haircut".into();
        bookings[1].customer.name = "Joanna".into();
        bookings[1].service = "Coloring".into();
        bookings[2].customer.name = "Sam".into();
        bookings[2].service = "Haircut & Beard".into();

        let criteria = FilterCriteria {
            scope: Scope::All,
            name: "JO".into(),
            ..Default::default()
        };
        let names: Vec<&str> = filter(&bookings, &criteria, date("2024-05-01"), Weekday::Sun)
            .map(|booking| booking.customer.name.as_str())
            .collect();
        assert_eq!(names, vec!["Jo Miller", "Joanna"]);

        let criteria = FilterCriteria {
            scope: Scope::All,
            name: "jo".into(),
            service: "haircut".into(),
            ..Default::default()
        };
        let names: Vec<&str> = filter(&bookings, &criteria, date("2024-05-01"), Weekday::Sun)
            .map(|booking| booking.customer.name.as_str())
            .collect();
        assert_eq!(names, vec!["Jo Miller"]);

        let criteria = FilterCriteria {
            scope: Scope::All,
            email: "nobody@".into(),
            ..Default::default()
        };
        assert_eq!(
            filter(&bookings, &criteria, date("2024-05-01"), Weekday::Sun).count(),
            0
        );
    }

    #[test]
    fn test_filter_is_restartable() {
        let bookings = bookings_on(&["2024-04-30", "2024-05-01", "2024-05-01"]);
        let criteria = FilterCriteria::default();

        let selection = filter(&bookings, &criteria, date("2024-05-01"), Weekday::Sun);
        let first: Vec<_> = selection.clone().collect();
        let second: Vec<_> = selection.collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_criteria_defaults_from_query() {
        let criteria: FilterCriteria = serde_json::from_str(r#"{"range": "week"}"#).unwrap();
        assert_eq!(criteria.scope, Scope::Upcoming);
        assert_eq!(criteria.range, Range::Week);
        assert!(criteria.name.is_empty());
    }
}
