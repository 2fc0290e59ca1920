//! Command handlers.
//!
//! One method per command; each performs its store reads/writes and returns
//! the composed reply. The Telegram adapter owns sending and the
//! store-failure boundary.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::commands::Command;
use crate::domain::{today_utc, NewMeal, UserId};
use crate::formatting;
use crate::store::MealStore;
use crate::summary::{activities_by_date, totals_by_date, week_window_start};
use crate::Result;

pub struct Handlers {
    store: Arc<dyn MealStore>,
}

impl Handlers {
    pub fn new(store: Arc<dyn MealStore>) -> Self {
        Self { store }
    }

    /// Run one command to completion and return the reply text.
    pub async fn dispatch(&self, user: UserId, cmd: Command) -> Result<String> {
        match cmd {
            Command::Help => Ok(formatting::help_text()),
            Command::Add {
                meal,
                calories,
                protein,
                date,
            } => self.add_meal(user, meal, calories, protein, date).await,
            Command::RemoveLast => self.remove_last(user).await,
            Command::Remove { date, index } => self.remove_by_index(user, date, index).await,
            Command::Today => self.day_summary(user, today_utc(), true).await,
            Command::Day { date } => self.day_summary(user, date, false).await,
            Command::Week => self.week_summary(user).await,
            Command::AllTime => self.alltime_summary(user).await,
            Command::SetActivity { activity, date } => {
                self.set_activity(user, activity, date).await
            }
            Command::SetGoal { calories, protein } => {
                self.set_goal(user, calories, protein).await
            }
        }
    }

    async fn add_meal(
        &self,
        user: UserId,
        meal: String,
        calories: i64,
        protein: i64,
        date: Option<NaiveDate>,
    ) -> Result<String> {
        let date = date.unwrap_or_else(today_utc);
        let record = self
            .store
            .insert_meal(&NewMeal {
                user_id: user,
                date,
                meal,
                calories,
                protein,
            })
            .await?;
        Ok(formatting::meal_saved(
            &record.meal,
            record.calories,
            record.protein,
            record.date,
        ))
    }

    async fn remove_last(&self, user: UserId) -> Result<String> {
        let Some(last) = self.store.last_meal(user).await? else {
            return Ok("❌ No meals to remove.".to_string());
        };
        self.store.delete_meal(last.id).await?;
        Ok(formatting::last_meal_removed(&last))
    }

    async fn remove_by_index(&self, user: UserId, date: NaiveDate, index: usize) -> Result<String> {
        let meals = self.store.meals_for_date(user, date).await?;
        if meals.is_empty() {
            return Ok(format!("No meals found for {date}."));
        }
        if index == 0 || index > meals.len() {
            return Ok(format!(
                "❌ Invalid meal number. There are only {} meals for {date}.",
                meals.len()
            ));
        }
        let meal = &meals[index - 1];
        self.store.delete_meal(meal.id).await?;
        Ok(formatting::meal_removed(meal, date))
    }

    async fn day_summary(&self, user: UserId, date: NaiveDate, is_today: bool) -> Result<String> {
        let meals = self.store.meals_for_date(user, date).await?;
        let activity = self.store.activity_for_date(user, date).await?;
        let goal = self.store.goal(user).await?;
        Ok(formatting::day_reply(
            date,
            is_today,
            &meals,
            activity.as_ref(),
            goal.as_ref(),
        ))
    }

    async fn week_summary(&self, user: UserId) -> Result<String> {
        let start = week_window_start(today_utc());
        let meals = self.store.meals_since(user, start).await?;
        let activities = self.store.activities_since(user, start).await?;
        let goal = self.store.goal(user).await?;

        let by_date = totals_by_date(&meals);
        let notes = activities_by_date(activities);
        Ok(formatting::week_reply(&by_date, &notes, goal.as_ref()))
    }

    async fn alltime_summary(&self, user: UserId) -> Result<String> {
        let days = self.store.daily_totals(user).await?;
        let activities = self.store.activities_all(user).await?;
        let notes = activities_by_date(activities);
        Ok(formatting::alltime_reply(&days, &notes))
    }

    async fn set_activity(
        &self,
        user: UserId,
        activity: String,
        date: Option<NaiveDate>,
    ) -> Result<String> {
        let date = date.unwrap_or_else(today_utc);
        self.store.upsert_activity(user, date, &activity).await?;
        Ok(formatting::activity_saved(&activity, date))
    }

    async fn set_goal(&self, user: UserId, calories: i64, protein: i64) -> Result<String> {
        self.store.upsert_goal(user, calories, protein).await?;
        Ok(formatting::goal_saved(calories, protein))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::domain::{ActivityRecord, DayTotals, GoalRecord, MealRecord};

    /// In-memory store mirroring the port contract, for handler tests.
    #[derive(Default)]
    struct MemoryStore {
        inner: Mutex<MemoryState>,
    }

    #[derive(Default)]
    struct MemoryState {
        next_id: i64,
        meals: Vec<MealRecord>,
        activities: HashMap<(i64, NaiveDate), ActivityRecord>,
        goals: HashMap<i64, GoalRecord>,
    }

    #[async_trait]
    impl MealStore for MemoryStore {
        async fn insert_meal(&self, meal: &NewMeal) -> crate::Result<MealRecord> {
            let mut st = self.inner.lock().unwrap();
            st.next_id += 1;
            let record = MealRecord {
                id: st.next_id,
                user_id: meal.user_id,
                date: meal.date,
                meal: meal.meal.clone(),
                calories: meal.calories,
                protein: meal.protein,
                timestamp: meal.timestamp(),
            };
            st.meals.push(record.clone());
            Ok(record)
        }

        async fn last_meal(&self, user: UserId) -> crate::Result<Option<MealRecord>> {
            let st = self.inner.lock().unwrap();
            Ok(st
                .meals
                .iter()
                .filter(|m| m.user_id == user)
                .max_by_key(|m| (m.timestamp, m.id))
                .cloned())
        }

        async fn meals_for_date(
            &self,
            user: UserId,
            date: NaiveDate,
        ) -> crate::Result<Vec<MealRecord>> {
            let st = self.inner.lock().unwrap();
            Ok(st
                .meals
                .iter()
                .filter(|m| m.user_id == user && m.date == date)
                .cloned()
                .collect())
        }

        async fn delete_meal(&self, id: i64) -> crate::Result<bool> {
            let mut st = self.inner.lock().unwrap();
            let before = st.meals.len();
            st.meals.retain(|m| m.id != id);
            Ok(st.meals.len() < before)
        }

        async fn meals_since(
            &self,
            user: UserId,
            since: DateTime<Utc>,
        ) -> crate::Result<Vec<MealRecord>> {
            let st = self.inner.lock().unwrap();
            Ok(st
                .meals
                .iter()
                .filter(|m| m.user_id == user && m.timestamp >= since)
                .cloned()
                .collect())
        }

        async fn activities_since(
            &self,
            user: UserId,
            since: DateTime<Utc>,
        ) -> crate::Result<Vec<ActivityRecord>> {
            let st = self.inner.lock().unwrap();
            Ok(st
                .activities
                .values()
                .filter(|a| a.user_id == user && a.timestamp >= since)
                .cloned()
                .collect())
        }

        async fn activities_all(&self, user: UserId) -> crate::Result<Vec<ActivityRecord>> {
            let st = self.inner.lock().unwrap();
            Ok(st
                .activities
                .values()
                .filter(|a| a.user_id == user)
                .cloned()
                .collect())
        }

        async fn activity_for_date(
            &self,
            user: UserId,
            date: NaiveDate,
        ) -> crate::Result<Option<ActivityRecord>> {
            let st = self.inner.lock().unwrap();
            Ok(st.activities.get(&(user.0, date)).cloned())
        }

        async fn upsert_activity(
            &self,
            user: UserId,
            date: NaiveDate,
            activity: &str,
        ) -> crate::Result<()> {
            let mut st = self.inner.lock().unwrap();
            st.activities.insert(
                (user.0, date),
                ActivityRecord {
                    user_id: user,
                    date,
                    activity: activity.to_string(),
                    timestamp: crate::domain::midnight_utc(date),
                },
            );
            Ok(())
        }

        async fn goal(&self, user: UserId) -> crate::Result<Option<GoalRecord>> {
            let st = self.inner.lock().unwrap();
            Ok(st.goals.get(&user.0).copied())
        }

        async fn upsert_goal(
            &self,
            user: UserId,
            calories: i64,
            protein: i64,
        ) -> crate::Result<()> {
            let mut st = self.inner.lock().unwrap();
            st.goals.insert(
                user.0,
                GoalRecord {
                    user_id: user,
                    calories,
                    protein,
                },
            );
            Ok(())
        }

        async fn daily_totals(
            &self,
            user: UserId,
        ) -> crate::Result<Vec<(NaiveDate, DayTotals)>> {
            let st = self.inner.lock().unwrap();
            let user_meals: Vec<MealRecord> = st
                .meals
                .iter()
                .filter(|m| m.user_id == user)
                .cloned()
                .collect();
            Ok(totals_by_date(&user_meals).into_iter().collect())
        }
    }

    fn handlers() -> Handlers {
        Handlers::new(Arc::new(MemoryStore::default()))
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn add(meal: &str, calories: i64, protein: i64, date: Option<&str>) -> Command {
        Command::Add {
            meal: meal.to_string(),
            calories,
            protein,
            date: date.map(d),
        }
    }

    const USER: UserId = UserId(7);

    #[tokio::test]
    async fn add_without_date_stores_under_current_utc_date() {
        let h = handlers();
        let reply = h.dispatch(USER, add("Chicken", 350, 30, None)).await.unwrap();
        assert_eq!(
            reply,
            format!("✅ Saved: Chicken (350 kcal, 30g protein) for {}", today_utc())
        );

        let today = h.dispatch(USER, Command::Today).await.unwrap();
        assert!(today.contains("🍽 Chicken — 350 kcal, 30g protein"));
        assert!(today.contains("<b>Total:</b> 350 kcal, 30g protein"));
    }

    #[tokio::test]
    async fn remove_last_twice_deletes_two_distinct_records() {
        let h = handlers();
        h.dispatch(USER, add("First", 100, 10, Some("2024-06-14")))
            .await
            .unwrap();
        h.dispatch(USER, add("Second", 200, 20, Some("2024-06-15")))
            .await
            .unwrap();

        let first = h.dispatch(USER, Command::RemoveLast).await.unwrap();
        assert!(first.contains("Second"));
        let second = h.dispatch(USER, Command::RemoveLast).await.unwrap();
        assert!(second.contains("First"));
        let third = h.dispatch(USER, Command::RemoveLast).await.unwrap();
        assert_eq!(third, "❌ No meals to remove.");
    }

    #[tokio::test]
    async fn remove_last_ties_broken_by_insertion_order() {
        let h = handlers();
        h.dispatch(USER, add("Early", 100, 10, Some("2024-06-15")))
            .await
            .unwrap();
        h.dispatch(USER, add("Late", 200, 20, Some("2024-06-15")))
            .await
            .unwrap();

        let reply = h.dispatch(USER, Command::RemoveLast).await.unwrap();
        assert!(reply.contains("Late"));
    }

    #[tokio::test]
    async fn remove_by_index_validates_bounds() {
        let h = handlers();
        for name in ["A", "B", "C"] {
            h.dispatch(USER, add(name, 100, 10, Some("2024-06-15")))
                .await
                .unwrap();
        }

        let date = d("2024-06-15");
        let zero = h
            .dispatch(USER, Command::Remove { date, index: 0 })
            .await
            .unwrap();
        assert!(zero.contains("only 3 meals"));
        let four = h
            .dispatch(USER, Command::Remove { date, index: 4 })
            .await
            .unwrap();
        assert!(four.contains("only 3 meals"));

        let two = h
            .dispatch(USER, Command::Remove { date, index: 2 })
            .await
            .unwrap();
        assert!(two.contains("🗑 Removed: B"));

        // The list shrank; index 3 is now out of range.
        let stale = h
            .dispatch(USER, Command::Remove { date, index: 3 })
            .await
            .unwrap();
        assert!(stale.contains("only 2 meals"));
    }

    #[tokio::test]
    async fn remove_by_index_on_empty_date() {
        let h = handlers();
        let reply = h
            .dispatch(
                USER,
                Command::Remove {
                    date: d("2024-06-15"),
                    index: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(reply, "No meals found for 2024-06-15.");
    }

    #[tokio::test]
    async fn day_summary_reports_activity_and_goal_without_meals() {
        let h = handlers();
        h.dispatch(
            USER,
            Command::SetActivity {
                activity: "rest day".to_string(),
                date: Some(d("2024-06-15")),
            },
        )
        .await
        .unwrap();
        h.dispatch(
            USER,
            Command::SetGoal {
                calories: 2200,
                protein: 140,
            },
        )
        .await
        .unwrap();

        let reply = h
            .dispatch(USER, Command::Day { date: d("2024-06-15") })
            .await
            .unwrap();
        assert!(reply.contains("rest day"));
        assert!(reply.contains("2200 kcal, 140g protein"));
    }

    #[tokio::test]
    async fn upserts_keep_exactly_one_record_with_latest_values() {
        let h = handlers();
        let date = d("2024-06-15");

        h.dispatch(
            USER,
            Command::SetActivity {
                activity: "swim".to_string(),
                date: Some(date),
            },
        )
        .await
        .unwrap();
        h.dispatch(
            USER,
            Command::SetActivity {
                activity: "bike".to_string(),
                date: Some(date),
            },
        )
        .await
        .unwrap();

        h.dispatch(USER, Command::SetGoal { calories: 2000, protein: 120 })
            .await
            .unwrap();
        h.dispatch(USER, Command::SetGoal { calories: 2400, protein: 150 })
            .await
            .unwrap();

        let reply = h.dispatch(USER, Command::Day { date }).await.unwrap();
        assert!(reply.contains("bike"));
        assert!(!reply.contains("swim"));
        assert!(reply.contains("2400 kcal, 150g protein"));
        assert!(!reply.contains("2000"));
    }

    #[tokio::test]
    async fn week_summary_averages_over_meal_days_only() {
        let h = handlers();
        let today = today_utc();
        let yesterday = today.pred_opt().unwrap();

        h.dispatch(USER, add("A", 1400, 90, Some(&today.to_string())))
            .await
            .unwrap();
        h.dispatch(USER, add("B", 1600, 110, Some(&yesterday.to_string())))
            .await
            .unwrap();
        // Activity-only day inside the window must not lower the average.
        if let Some(two_back) = yesterday.pred_opt() {
            h.dispatch(
                USER,
                Command::SetActivity {
                    activity: "long walk".to_string(),
                    date: Some(two_back),
                },
            )
            .await
            .unwrap();
        }

        let reply = h.dispatch(USER, Command::Week).await.unwrap();
        assert!(reply.contains("<b>Average/day:</b> 1500 kcal"));
        assert!(reply.contains("<b>Average/day:</b> 100g protein"));
        assert!(reply.contains("long walk"));
    }

    #[tokio::test]
    async fn alltime_summary_counts_match_contributing_records() {
        let h = handlers();
        h.dispatch(USER, add("A", 100, 10, Some("2024-06-14")))
            .await
            .unwrap();
        h.dispatch(USER, add("B", 200, 20, Some("2024-06-15")))
            .await
            .unwrap();
        h.dispatch(USER, add("C", 300, 30, Some("2024-06-15")))
            .await
            .unwrap();

        let reply = h.dispatch(USER, Command::AllTime).await.unwrap();
        assert!(reply.contains("📆 2024-06-14: 100 kcal, 10g protein (1 meal)"));
        assert!(reply.contains("📆 2024-06-15: 500 kcal, 50g protein (2 meals)"));
        // Asymmetry preserved: no goal line in the all-time view.
        h.dispatch(USER, Command::SetGoal { calories: 2000, protein: 100 })
            .await
            .unwrap();
        let with_goal = h.dispatch(USER, Command::AllTime).await.unwrap();
        assert!(!with_goal.contains("Goal"));
    }

    #[tokio::test]
    async fn meals_are_scoped_to_a_single_user() {
        let h = handlers();
        h.dispatch(UserId(1), add("Mine", 100, 10, Some("2024-06-15")))
            .await
            .unwrap();

        let other = h
            .dispatch(UserId(2), Command::Day { date: d("2024-06-15") })
            .await
            .unwrap();
        assert_eq!(other, "No meals logged for 2024-06-15.");
    }
}
