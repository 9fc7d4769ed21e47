//! Enumerated option sets for the storefront's dropdowns
//!
//! The storefront's select lists are an external, unversioned dependency.
//! Fixtures pick from these sets instead of hard-coding a single value so a
//! change on the site only needs an edit here.

use chrono::{Datelike, Months, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Countries offered by the signup form's `country` select.
pub const COUNTRIES: &[&str] = &[
    "India",
    "United States",
    "Canada",
    "Australia",
    "Israel",
    "New Zealand",
    "Singapore",
];

/// Month names as rendered in the birth-date select.
pub const MONTHS: &[&str] = &[
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Oldest and newest years listed in the birth-year select.
pub const FIRST_BIRTH_YEAR: i32 = 1900;
pub const LAST_BIRTH_YEAR: i32 = 2021;

/// Pick a country from [`COUNTRIES`].
pub fn pick_country<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    COUNTRIES.choose(rng).copied().unwrap_or("Canada")
}

/// Honorific offered by the signup form's title radio buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Title {
    #[default]
    Mr,
    Mrs,
}

impl Title {
    /// Value attribute of the matching radio button.
    pub fn as_str(&self) -> &'static str {
        match self {
            Title::Mr => "Mr",
            Title::Mrs => "Mrs",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Title::Mr
        } else {
            Title::Mrs
        }
    }
}

/// A birth date expressed the way the signup selects expect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthDate {
    /// Day of month without padding ("1" .. "31")
    pub day: String,
    /// English month name
    pub month: String,
    /// Four digit year
    pub year: String,
}

impl BirthDate {
    /// Build from a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: date.day().to_string(),
            month: MONTHS[date.month0() as usize].to_string(),
            year: date.year().to_string(),
        }
    }

    /// A birth date for someone aged between `min_age` and `max_age`,
    /// clamped to the years the select actually lists.
    pub fn random_for_age<R: Rng + ?Sized>(rng: &mut R, min_age: u32, max_age: u32) -> Self {
        let today = Utc::now().date_naive();
        let age = rng.gen_range(min_age..=max_age.max(min_age));
        let anchor = today
            .checked_sub_months(Months::new(age * 12))
            .unwrap_or(today);
        let offset_days = rng.gen_range(0..365);
        let mut date = anchor - chrono::Duration::days(offset_days);

        if date.year() > LAST_BIRTH_YEAR {
            date = NaiveDate::from_ymd_opt(LAST_BIRTH_YEAR, date.month(), date.day().min(28))
                .unwrap_or(date);
        }
        if date.year() < FIRST_BIRTH_YEAR {
            date = NaiveDate::from_ymd_opt(FIRST_BIRTH_YEAR, date.month(), date.day().min(28))
                .unwrap_or(date);
        }

        Self::from_date(date)
    }

    /// True when every component is one of the select options.
    pub fn is_listed(&self) -> bool {
        let day_ok = self
            .day
            .parse::<u32>()
            .map(|d| (1..=31).contains(&d))
            .unwrap_or(false);
        let year_ok = self
            .year
            .parse::<i32>()
            .map(|y| (FIRST_BIRTH_YEAR..=LAST_BIRTH_YEAR).contains(&y))
            .unwrap_or(false);
        day_ok && year_ok && MONTHS.contains(&self.month.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_birth_date_from_date() {
        let date = NaiveDate::from_ymd_opt(1990, 5, 10).unwrap();
        let birth = BirthDate::from_date(date);
        assert_eq!(birth.day, "10");
        assert_eq!(birth.month, "May");
        assert_eq!(birth.year, "1990");
        assert!(birth.is_listed());
    }

    #[test]
    fn test_random_birth_dates_are_listed() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let birth = BirthDate::random_for_age(&mut rng, 18, 80);
            assert!(birth.is_listed(), "unlisted birth date: {:?}", birth);
        }
    }

    #[test]
    fn test_pick_country_is_from_list() {
        let mut rng = rand::thread_rng();
        let country = pick_country(&mut rng);
        assert!(COUNTRIES.contains(&country));
    }
}
