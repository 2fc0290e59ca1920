//! Aggregation over meal and activity records.
//!
//! Pure functions: the store hands back flat record lists, these group and
//! sum them. `BTreeMap` keys give the ascending date order the views report.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::domain::{midnight_utc, ActivityRecord, DayTotals, MealRecord};

/// Start of the 7-calendar-day window ending on `today` (inclusive):
/// today minus 6 days, truncated to midnight UTC.
pub fn week_window_start(today: NaiveDate) -> DateTime<Utc> {
    let start = today.checked_sub_days(Days::new(6)).unwrap_or(today);
    midnight_utc(start)
}

/// Group meals by the date derived from their timestamp and sum per day.
pub fn totals_by_date(meals: &[MealRecord]) -> BTreeMap<NaiveDate, DayTotals> {
    let mut by_date: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for meal in meals {
        let day = by_date.entry(meal.timestamp.date_naive()).or_default();
        day.calories += meal.calories;
        day.protein += meal.protein;
        day.meals += 1;
    }
    by_date
}

/// Sum a single day's meals (day view).
pub fn sum_meals(meals: &[MealRecord]) -> DayTotals {
    let mut totals = DayTotals::default();
    for meal in meals {
        totals.calories += meal.calories;
        totals.protein += meal.protein;
        totals.meals += 1;
    }
    totals
}

/// Cross-day totals and the simple per-day mean for the week view.
///
/// The denominator is the number of distinct dates with at least one meal;
/// activity-only days never lower the average.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekAverages {
    pub total_calories: i64,
    pub total_protein: i64,
    pub meal_days: i64,
    pub avg_calories: i64,
    pub avg_protein: i64,
}

pub fn week_averages(by_date: &BTreeMap<NaiveDate, DayTotals>) -> WeekAverages {
    let meal_days = by_date.len() as i64;
    if meal_days == 0 {
        return WeekAverages::default();
    }

    let total_calories: i64 = by_date.values().map(|d| d.calories).sum();
    let total_protein: i64 = by_date.values().map(|d| d.protein).sum();

    WeekAverages {
        total_calories,
        total_protein,
        meal_days,
        avg_calories: rounded_mean(total_calories, meal_days),
        avg_protein: rounded_mean(total_protein, meal_days),
    }
}

/// Index activity notes by date for merging into per-day lines.
pub fn activities_by_date(activities: Vec<ActivityRecord>) -> BTreeMap<NaiveDate, String> {
    activities
        .into_iter()
        .map(|a| (a.date, a.activity))
        .collect()
}

fn rounded_mean(total: i64, days: i64) -> i64 {
    (total as f64 / days as f64).round() as i64
}
