//! Reply composition for Telegram HTML parse mode.
//!
//! All user-supplied free text (meal names, activity notes) is HTML-escaped
//! before being embedded in a reply; dates and numbers are generated and need
//! no escaping.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{ActivityRecord, DayTotals, GoalRecord, MealRecord};
use crate::summary::{sum_meals, week_averages};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn help_text() -> String {
    "🍽 <b>Meal Tracker Bot</b>\n\n\
<b>📋 Commands:</b>\n\
/add &lt;name&gt; &lt;kcal&gt; &lt;protein&gt; [YYYY-MM-DD] - Log a meal\n\
/remove_last - Delete the most recent meal\n\
/remove &lt;YYYY-MM-DD&gt; &lt;n&gt; - Delete the n-th meal of a day\n\
/today - Today's meals, activity and goal\n\
/day &lt;YYYY-MM-DD&gt; - Summary for a specific day\n\
/week - Last 7 days summary\n\
/summary - All-time per-day summary\n\
/setActivity (&lt;text&gt;) [YYYY-MM-DD] - Set the day's activity note\n\
/setGoal &lt;kcal&gt; &lt;protein&gt; - Set your daily goal"
        .to_string()
}

pub fn meal_saved(meal: &str, calories: i64, protein: i64, date: NaiveDate) -> String {
    format!(
        "✅ Saved: {} ({calories} kcal, {protein}g protein) for {date}",
        escape_html(meal)
    )
}

pub fn last_meal_removed(meal: &MealRecord) -> String {
    format!(
        "🗑 Removed last meal: {} ({} kcal, {}g protein)",
        escape_html(&meal.meal),
        meal.calories,
        meal.protein
    )
}

pub fn meal_removed(meal: &MealRecord, date: NaiveDate) -> String {
    format!(
        "🗑 Removed: {} ({} kcal, {}g) from {date}",
        escape_html(&meal.meal),
        meal.calories,
        meal.protein
    )
}

pub fn activity_saved(activity: &str, date: NaiveDate) -> String {
    format!("✅ Activity for {date}: {}", escape_html(activity))
}

pub fn goal_saved(calories: i64, protein: i64) -> String {
    format!("🎯 Goal set: {calories} kcal, {protein}g protein")
}

fn goal_line(goal: &GoalRecord) -> String {
    format!(
        "🎯 <b>Goal:</b> {} kcal, {}g protein",
        goal.calories, goal.protein
    )
}

fn activity_line(activity: &ActivityRecord) -> String {
    format!("🏃 <b>Activity:</b> {}", escape_html(&activity.activity))
}

/// Day view (`/today`, `/day`). An empty meal list still reports the
/// activity note and goal when they exist.
pub fn day_reply(
    date: NaiveDate,
    is_today: bool,
    meals: &[MealRecord],
    activity: Option<&ActivityRecord>,
    goal: Option<&GoalRecord>,
) -> String {
    if meals.is_empty() && activity.is_none() && goal.is_none() {
        if is_today {
            return "No meals logged for today.".to_string();
        }
        return format!("No meals logged for {date}.");
    }

    let mut lines: Vec<String> = Vec::new();
    if is_today {
        lines.push("📅 <b>Today's meals:</b>".to_string());
    } else {
        lines.push(format!("📅 <b>Meals for {date}:</b>"));
    }

    if meals.is_empty() {
        lines.push("No meals logged.".to_string());
    } else {
        for meal in meals {
            lines.push(format!(
                "🍽 {} — {} kcal, {}g protein",
                escape_html(&meal.meal),
                meal.calories,
                meal.protein
            ));
        }
        let totals = sum_meals(meals);
        lines.push(String::new());
        lines.push(format!(
            "🔥 <b>Total:</b> {} kcal, {}g protein",
            totals.calories, totals.protein
        ));
    }

    if let Some(a) = activity {
        lines.push(activity_line(a));
    }
    if let Some(g) = goal {
        lines.push(goal_line(g));
    }

    lines.join("\n")
}

fn meal_count_suffix(count: i64) -> String {
    format!("({count} meal{})", if count == 1 { "" } else { "s" })
}

/// Week view: per-day lines ascending, activity notes merged in, then
/// cross-day averages over meal-days only, then the goal if set.
pub fn week_reply(
    by_date: &BTreeMap<NaiveDate, DayTotals>,
    activities: &BTreeMap<NaiveDate, String>,
    goal: Option<&GoalRecord>,
) -> String {
    if by_date.is_empty() && activities.is_empty() {
        return "No meals found in the last 7 days.".to_string();
    }

    let mut lines: Vec<String> = vec!["📊 <b>Last 7 Days Summary:</b>".to_string(), String::new()];

    // Union of meal-days and activity-only days, ascending.
    let mut dates: Vec<NaiveDate> = by_date.keys().chain(activities.keys()).copied().collect();
    dates.sort_unstable();
    dates.dedup();

    for date in dates {
        let mut line = format!("📆 {date}:");
        if let Some(day) = by_date.get(&date) {
            line.push_str(&format!(
                " {} kcal, {}g protein {}",
                day.calories,
                day.protein,
                meal_count_suffix(day.meals)
            ));
        }
        if let Some(activity) = activities.get(&date) {
            if by_date.contains_key(&date) {
                line.push_str(" ·");
            }
            line.push_str(&format!(" 🏃 {}", escape_html(activity)));
        }
        lines.push(line);
    }

    let avgs = week_averages(by_date);
    if avgs.meal_days > 0 {
        lines.push(String::new());
        lines.push(format!("🔥 <b>Average/day:</b> {} kcal", avgs.avg_calories));
        lines.push(format!(
            "💪 <b>Average/day:</b> {}g protein",
            avgs.avg_protein
        ));
    }

    if let Some(g) = goal {
        lines.push(goal_line(g));
    }

    lines.join("\n")
}

/// All-time view: store-side per-date totals with meal counts, activity
/// notes merged in. No goal line in this view.
pub fn alltime_reply(
    days: &[(NaiveDate, DayTotals)],
    activities: &BTreeMap<NaiveDate, String>,
) -> String {
    if days.is_empty() {
        return "No meals logged yet.".to_string();
    }

    let mut lines: Vec<String> = vec!["📒 <b>Daily Summary:</b>".to_string(), String::new()];
    for (date, day) in days {
        let mut line = format!(
            "📆 {date}: {} kcal, {}g protein {}",
            day.calories,
            day.protein,
            meal_count_suffix(day.meals)
        );
        if let Some(activity) = activities.get(date) {
            line.push_str(&format!(" · 🏃 {}", escape_html(activity)));
        }
        lines.push(line);
    }

    lines.join("\n")
}
