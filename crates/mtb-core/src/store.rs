use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{ActivityRecord, DayTotals, GoalRecord, MealRecord, NewMeal, UserId};
use crate::Result;

/// Hexagonal port for the bot's three collections (meals, activities, goals).
///
/// Constructed once at startup and passed to each handler. Every operation is
/// scoped to a single user; adapters map their failures into `Error::Store`.
#[async_trait]
pub trait MealStore: Send + Sync {
    /// Insert one meal record and return it with its assigned id.
    async fn insert_meal(&self, meal: &NewMeal) -> Result<MealRecord>;

    /// The most-recently-timestamped meal for the user; ties broken by
    /// highest id.
    async fn last_meal(&self, user: UserId) -> Result<Option<MealRecord>>;

    /// All meals for a user+date, in insertion (id ascending) order. This is
    /// the order `/remove <date> <index>` addresses.
    async fn meals_for_date(&self, user: UserId, date: NaiveDate) -> Result<Vec<MealRecord>>;

    /// Delete a meal by id; `false` when no such record existed.
    async fn delete_meal(&self, id: i64) -> Result<bool>;

    /// Meals with `timestamp >= since` (week window).
    async fn meals_since(&self, user: UserId, since: DateTime<Utc>) -> Result<Vec<MealRecord>>;

    /// Activity notes with `timestamp >= since` (week window).
    async fn activities_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>>;

    /// Every activity note for the user (all-time view merge).
    async fn activities_all(&self, user: UserId) -> Result<Vec<ActivityRecord>>;

    async fn activity_for_date(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> Result<Option<ActivityRecord>>;

    /// Create or overwrite the single activity note for user+date.
    async fn upsert_activity(&self, user: UserId, date: NaiveDate, activity: &str) -> Result<()>;

    async fn goal(&self, user: UserId) -> Result<Option<GoalRecord>>;

    /// Create or overwrite the user's single goal record.
    async fn upsert_goal(&self, user: UserId, calories: i64, protein: i64) -> Result<()>;

    /// Store-side aggregation for the all-time view: per-date totals and
    /// meal counts, ascending by date.
    async fn daily_totals(&self, user: UserId) -> Result<Vec<(NaiveDate, DayTotals)>>;
}
