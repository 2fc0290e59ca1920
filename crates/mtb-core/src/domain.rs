use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// A logged meal as stored.
///
/// Never updated in place: created by `/add`, deleted by `/remove` or
/// `/remove_last`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MealRecord {
    pub id: i64,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub meal: String,
    pub calories: i64,
    pub protein: i64,
    pub timestamp: DateTime<Utc>,
}

/// A meal about to be inserted.
#[derive(Clone, Debug)]
pub struct NewMeal {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub meal: String,
    pub calories: i64,
    pub protein: i64,
}

impl NewMeal {
    /// Timestamp anchored to midnight UTC of `date`.
    ///
    /// Invariant: the timestamp is always derived from the date string, so it
    /// serves both as the week-view grouping key and as the range-query field.
    pub fn timestamp(&self) -> DateTime<Utc> {
        midnight_utc(self.date)
    }
}

/// Daily activity note; at most one per user per date (upserted).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityRecord {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub activity: String,
    pub timestamp: DateTime<Utc>,
}

/// Calorie/protein goal; at most one per user, global (not per-date).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GoalRecord {
    pub user_id: UserId,
    pub calories: i64,
    pub protein: i64,
}

/// Per-day aggregate row, produced both by in-memory grouping (week view)
/// and by store-side aggregation (all-time view).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DayTotals {
    pub calories: i64,
    pub protein: i64,
    pub meals: i64,
}

pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Current UTC calendar date, the default for `/add` and the anchor for
/// `/today` and the week window.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
