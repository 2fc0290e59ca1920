//! SQLite-backed implementation of the `MealStore` port.
//!
//! Three tables map the bot's three collections: `meals`, `activities`
//! (one row per user+date), `goals` (one row per user). Timestamps are
//! stored as RFC3339 UTC strings; the format is fixed, so lexicographic
//! comparison matches chronological order for the week range scan.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use mtb_core::{
    domain::{midnight_utc, ActivityRecord, DayTotals, GoalRecord, MealRecord, NewMeal, UserId},
    store::MealStore,
    Error, Result,
};

pub struct SqliteMealStore {
    conn: Mutex<Connection>,
}

impl SqliteMealStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Store(format!("failed to open {}: {e}", path.display())))?;
        migrate(&conn)?;
        tracing::info!(path = %path.display(), "meal store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(store_err)?;

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                meal TEXT NOT NULL,
                calories INTEGER NOT NULL,
                protein INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_meals_user_date ON meals(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_meals_user_ts ON meals(user_id, timestamp);

            CREATE TABLE IF NOT EXISTS activities (
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                activity TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (user_id, date)
            );

            CREATE TABLE IF NOT EXISTS goals (
                user_id INTEGER PRIMARY KEY,
                calories INTEGER NOT NULL,
                protein INTEGER NOT NULL
            );

            PRAGMA user_version = 1;",
        )
        .map_err(store_err)?;
    }

    Ok(())
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Store(format!("bad date {s:?} in store: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("bad timestamp {s:?} in store: {e}")))
}

/// Raw meal row before date/timestamp parsing.
type MealRow = (i64, i64, String, String, i64, i64, String);

fn meal_from_row(row: MealRow) -> Result<MealRecord> {
    let (id, user_id, date, meal, calories, protein, timestamp) = row;
    Ok(MealRecord {
        id,
        user_id: UserId(user_id),
        date: parse_date(&date)?,
        meal,
        calories,
        protein,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

fn collect_meals(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<MealRecord>> {
    let mut stmt = conn.prepare(sql).map_err(store_err)?;
    let rows: Vec<MealRow> = stmt
        .query_map(params, |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })
        .map_err(store_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(store_err)?;

    rows.into_iter().map(meal_from_row).collect()
}

fn collect_activities(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare(sql).map_err(store_err)?;
    let rows: Vec<(i64, String, String, String)> = stmt
        .query_map(params, |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .map_err(store_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(store_err)?;

    rows.into_iter()
        .map(|(user_id, date, activity, timestamp)| {
            Ok(ActivityRecord {
                user_id: UserId(user_id),
                date: parse_date(&date)?,
                activity,
                timestamp: parse_timestamp(&timestamp)?,
            })
        })
        .collect()
}

const MEAL_COLS: &str = "id, user_id, date, meal, calories, protein, timestamp";
const ACTIVITY_COLS: &str = "user_id, date, activity, timestamp";

#[async_trait]
impl MealStore for SqliteMealStore {
    async fn insert_meal(&self, meal: &NewMeal) -> Result<MealRecord> {
        let conn = self.conn.lock().await;
        let timestamp = meal.timestamp();
        conn.execute(
            "INSERT INTO meals (user_id, date, meal, calories, protein, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meal.user_id.0,
                meal.date.to_string(),
                meal.meal,
                meal.calories,
                meal.protein,
                timestamp.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;

        Ok(MealRecord {
            id: conn.last_insert_rowid(),
            user_id: meal.user_id,
            date: meal.date,
            meal: meal.meal.clone(),
            calories: meal.calories,
            protein: meal.protein,
            timestamp,
        })
    }

    async fn last_meal(&self, user: UserId) -> Result<Option<MealRecord>> {
        let conn = self.conn.lock().await;
        let mut meals = collect_meals(
            &conn,
            &format!(
                "SELECT {MEAL_COLS} FROM meals WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT 1"
            ),
            params![user.0],
        )?;
        Ok(meals.pop())
    }

    async fn meals_for_date(&self, user: UserId, date: NaiveDate) -> Result<Vec<MealRecord>> {
        let conn = self.conn.lock().await;
        collect_meals(
            &conn,
            &format!(
                "SELECT {MEAL_COLS} FROM meals WHERE user_id = ?1 AND date = ?2
                 ORDER BY id ASC"
            ),
            params![user.0, date.to_string()],
        )
    }

    async fn delete_meal(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute("DELETE FROM meals WHERE id = ?1", params![id])
            .map_err(store_err)?;
        Ok(affected > 0)
    }

    async fn meals_since(&self, user: UserId, since: DateTime<Utc>) -> Result<Vec<MealRecord>> {
        let conn = self.conn.lock().await;
        collect_meals(
            &conn,
            &format!(
                "SELECT {MEAL_COLS} FROM meals WHERE user_id = ?1 AND timestamp >= ?2
                 ORDER BY timestamp ASC, id ASC"
            ),
            params![user.0, since.to_rfc3339()],
        )
    }

    async fn activities_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        let conn = self.conn.lock().await;
        collect_activities(
            &conn,
            &format!(
                "SELECT {ACTIVITY_COLS} FROM activities
                 WHERE user_id = ?1 AND timestamp >= ?2 ORDER BY date ASC"
            ),
            params![user.0, since.to_rfc3339()],
        )
    }

    async fn activities_all(&self, user: UserId) -> Result<Vec<ActivityRecord>> {
        let conn = self.conn.lock().await;
        collect_activities(
            &conn,
            &format!("SELECT {ACTIVITY_COLS} FROM activities WHERE user_id = ?1 ORDER BY date ASC"),
            params![user.0],
        )
    }

    async fn activity_for_date(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> Result<Option<ActivityRecord>> {
        let conn = self.conn.lock().await;
        let mut activities = collect_activities(
            &conn,
            &format!("SELECT {ACTIVITY_COLS} FROM activities WHERE user_id = ?1 AND date = ?2"),
            params![user.0, date.to_string()],
        )?;
        Ok(activities.pop())
    }

    async fn upsert_activity(&self, user: UserId, date: NaiveDate, activity: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO activities (user_id, date, activity, timestamp)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, date) DO UPDATE SET
                 activity = excluded.activity,
                 timestamp = excluded.timestamp",
            params![
                user.0,
                date.to_string(),
                activity,
                midnight_utc(date).to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn goal(&self, user: UserId) -> Result<Option<GoalRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT calories, protein FROM goals WHERE user_id = ?1")
            .map_err(store_err)?;
        let mut rows = stmt
            .query_map(params![user.0], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(store_err)?;

        match rows.next() {
            Some(row) => {
                let (calories, protein): (i64, i64) = row.map_err(store_err)?;
                Ok(Some(GoalRecord {
                    user_id: user,
                    calories,
                    protein,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert_goal(&self, user: UserId, calories: i64, protein: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO goals (user_id, calories, protein) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 calories = excluded.calories,
                 protein = excluded.protein",
            params![user.0, calories, protein],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn daily_totals(&self, user: UserId) -> Result<Vec<(NaiveDate, DayTotals)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT date, SUM(calories), SUM(protein), COUNT(*)
                 FROM meals WHERE user_id = ?1
                 GROUP BY date ORDER BY date ASC",
            )
            .map_err(store_err)?;
        let rows: Vec<(String, i64, i64, i64)> = stmt
            .query_map(params![user.0], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .map_err(store_err)?
            .collect::<rusqlite::Result<_>>()
            .map_err(store_err)?;

        rows.into_iter()
            .map(|(date, calories, protein, meals)| {
                Ok((
                    parse_date(&date)?,
                    DayTotals {
                        calories,
                        protein,
                        meals,
                    },
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_meal(user: i64, date: &str, name: &str, calories: i64, protein: i64) -> NewMeal {
        NewMeal {
            user_id: UserId(user),
            date: d(date),
            meal: name.to_string(),
            calories,
            protein,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        let inserted = store
            .insert_meal(&new_meal(1, "2024-06-15", "Chicken", 350, 30))
            .await
            .unwrap();
        assert!(inserted.id > 0);
        assert_eq!(inserted.timestamp, midnight_utc(d("2024-06-15")));

        let meals = store
            .meals_for_date(UserId(1), d("2024-06-15"))
            .await
            .unwrap();
        assert_eq!(meals, vec![inserted]);
    }

    #[tokio::test]
    async fn meals_for_date_is_insertion_ordered_and_user_scoped() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-15", "First", 100, 10))
            .await
            .unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-15", "Second", 200, 20))
            .await
            .unwrap();
        store
            .insert_meal(&new_meal(2, "2024-06-15", "Other", 999, 99))
            .await
            .unwrap();

        let meals = store
            .meals_for_date(UserId(1), d("2024-06-15"))
            .await
            .unwrap();
        let names: Vec<&str> = meals.iter().map(|m| m.meal.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn last_meal_picks_latest_timestamp_then_highest_id() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-15", "Newest", 100, 10))
            .await
            .unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-10", "Older", 200, 20))
            .await
            .unwrap();
        let last = store.last_meal(UserId(1)).await.unwrap().unwrap();
        assert_eq!(last.meal, "Newest");

        // Same date: the later insert wins.
        store
            .insert_meal(&new_meal(1, "2024-06-15", "Tie", 300, 30))
            .await
            .unwrap();
        let last = store.last_meal(UserId(1)).await.unwrap().unwrap();
        assert_eq!(last.meal, "Tie");
    }

    #[tokio::test]
    async fn delete_meal_reports_missing_rows() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        let meal = store
            .insert_meal(&new_meal(1, "2024-06-15", "Chicken", 350, 30))
            .await
            .unwrap();
        assert!(store.delete_meal(meal.id).await.unwrap());
        assert!(!store.delete_meal(meal.id).await.unwrap());
        assert!(store.last_meal(UserId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn meals_since_is_an_inclusive_range_scan() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-08", "OutOfWindow", 100, 10))
            .await
            .unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-09", "Boundary", 200, 20))
            .await
            .unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-15", "Recent", 300, 30))
            .await
            .unwrap();

        let since = midnight_utc(d("2024-06-09"));
        let meals = store.meals_since(UserId(1), since).await.unwrap();
        let names: Vec<&str> = meals.iter().map(|m| m.meal.as_str()).collect();
        assert_eq!(names, vec!["Boundary", "Recent"]);
    }

    #[tokio::test]
    async fn activity_upsert_overwrites_per_user_date() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        let date = d("2024-06-15");
        store
            .upsert_activity(UserId(1), date, "swim")
            .await
            .unwrap();
        store
            .upsert_activity(UserId(1), date, "bike")
            .await
            .unwrap();
        store
            .upsert_activity(UserId(1), d("2024-06-16"), "run")
            .await
            .unwrap();

        let today = store
            .activity_for_date(UserId(1), date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(today.activity, "bike");

        let all = store.activities_all(UserId(1)).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn goal_upsert_keeps_one_row_per_user() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        assert!(store.goal(UserId(1)).await.unwrap().is_none());

        store.upsert_goal(UserId(1), 2000, 120).await.unwrap();
        store.upsert_goal(UserId(1), 2400, 150).await.unwrap();

        let goal = store.goal(UserId(1)).await.unwrap().unwrap();
        assert_eq!(goal.calories, 2400);
        assert_eq!(goal.protein, 150);
        assert!(store.goal(UserId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn daily_totals_groups_and_orders_by_date() {
        let store = SqliteMealStore::open_in_memory().unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-15", "B1", 200, 20))
            .await
            .unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-14", "A1", 100, 10))
            .await
            .unwrap();
        store
            .insert_meal(&new_meal(1, "2024-06-15", "B2", 300, 30))
            .await
            .unwrap();

        let days = store.daily_totals(UserId(1)).await.unwrap();
        assert_eq!(
            days,
            vec![
                (
                    d("2024-06-14"),
                    DayTotals {
                        calories: 100,
                        protein: 10,
                        meals: 1
                    }
                ),
                (
                    d("2024-06-15"),
                    DayTotals {
                        calories: 500,
                        protein: 50,
                        meals: 2
                    }
                ),
            ]
        );
    }
}
