//! Regex-matched command parsing.
//!
//! Incoming text either matches one of the fixed command patterns and becomes
//! a tagged [`Command`], or it matches nothing and the dispatcher stays
//! silent. There is no partial-match error reply.

use chrono::NaiveDate;
use regex::Regex;

/// A parsed bot command with validated arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Add {
        meal: String,
        calories: i64,
        protein: i64,
        /// `None` when the date was absent or not a real calendar date; the
        /// handler falls back to the current UTC date.
        date: Option<NaiveDate>,
    },
    RemoveLast,
    Remove {
        date: NaiveDate,
        /// 1-based position in the date's retrieval order.
        index: usize,
    },
    Today,
    Day {
        date: NaiveDate,
    },
    Week,
    AllTime,
    SetActivity {
        activity: String,
        date: Option<NaiveDate>,
    },
    SetGoal {
        calories: i64,
        protein: i64,
    },
}

pub struct CommandParser {
    help: Regex,
    add: Regex,
    remove_last: Regex,
    remove: Regex,
    today: Regex,
    day: Regex,
    week: Regex,
    summary: Regex,
    set_activity: Regex,
    set_goal: Regex,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    pub fn new() -> Self {
        let re = |pat: &str| Regex::new(pat).expect("valid regex");
        Self {
            help: re(r"^/(?:start|help)$"),
            add: re(r"^/add (\S+) (\d+) (\d+)(?: (\d{4}-\d{2}-\d{2}))?$"),
            remove_last: re(r"^/remove_last$"),
            remove: re(r"^/remove (\d{4}-\d{2}-\d{2}) (\d+)$"),
            today: re(r"^/today$"),
            day: re(r"^/day (\d{4}-\d{2}-\d{2})$"),
            week: re(r"^/week$"),
            summary: re(r"^/summary$"),
            set_activity: re(r"^/setActivity \((.+)\)(?: (\d{4}-\d{2}-\d{2}))?$"),
            set_goal: re(r"^/setGoal (\d+) (\d+)$"),
        }
    }

    /// Match `text` against the command surface. `None` means no handler
    /// fires at all.
    pub fn parse(&self, text: &str) -> Option<Command> {
        let text = text.trim();

        if self.help.is_match(text) {
            return Some(Command::Help);
        }
        if self.remove_last.is_match(text) {
            return Some(Command::RemoveLast);
        }
        if self.today.is_match(text) {
            return Some(Command::Today);
        }
        if self.week.is_match(text) {
            return Some(Command::Week);
        }
        if self.summary.is_match(text) {
            return Some(Command::AllTime);
        }

        if let Some(m) = self.add.captures(text) {
            return Some(Command::Add {
                meal: m[1].to_string(),
                calories: m[2].parse().ok()?,
                protein: m[3].parse().ok()?,
                // Absent or impossible dates (month 13) fall back to today.
                date: m.get(4).and_then(|d| parse_date(d.as_str())),
            });
        }

        if let Some(m) = self.remove.captures(text) {
            return Some(Command::Remove {
                date: parse_date(&m[1])?,
                index: m[2].parse().ok()?,
            });
        }

        if let Some(m) = self.day.captures(text) {
            return Some(Command::Day {
                date: parse_date(&m[1])?,
            });
        }

        if let Some(m) = self.set_activity.captures(text) {
            return Some(Command::SetActivity {
                activity: m[1].to_string(),
                date: m.get(2).and_then(|d| parse_date(d.as_str())),
            });
        }

        if let Some(m) = self.set_goal.captures(text) {
            return Some(Command::SetGoal {
                calories: m[1].parse().ok()?,
                protein: m[2].parse().ok()?,
            });
        }

        None
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
