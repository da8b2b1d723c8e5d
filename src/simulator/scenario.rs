//! Meal scenarios.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One meal event: a name, a time offset and a carbohydrate amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Meal label, e.g. `"breakfast"`.
    pub name: String,
    /// Offset from the scenario start (hours).
    pub hour: f64,
    /// Carbohydrate amount (g).
    pub carbs: f64,
}

impl Meal {
    /// Creates a meal.
    #[must_use]
    pub fn new(name: impl Into<String>, hour: f64, carbs: f64) -> Self {
        Self {
            name: name.into(),
            hour,
            carbs,
        }
    }

    /// Minute offset at which the meal is eaten.
    #[must_use]
    pub fn minute(&self) -> i64 {
        // Offsets are hours within a simulation horizon; the cast cannot overflow.
        #[allow(clippy::cast_possible_truncation)]
        let minute = (self.hour * 60.0).round() as i64;
        minute
    }
}

/// Ordered meal list anchored at a start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Wall-clock time of minute zero.
    pub start_time: DateTime<Utc>,
    /// Meals, in caller order.
    pub meals: Vec<Meal>,
}

impl Scenario {
    /// Creates a scenario.
    #[must_use]
    pub fn new(start_time: DateTime<Utc>, meals: Vec<Meal>) -> Self {
        Self { start_time, meals }
    }

    /// Carbohydrates eaten at `minute` (g). Meals sharing a minute add up.
    #[must_use]
    pub fn carbs_at(&self, minute: u32) -> f64 {
        self.meals
            .iter()
            .filter(|m| m.minute() == i64::from(minute))
            .map(|m| m.carbs)
            .sum()
    }

    /// Carbohydrates eaten in `[from, from + len)` minutes (g).
    #[must_use]
    pub fn carbs_between(&self, from: u32, len: u32) -> f64 {
        (from..from.saturating_add(len)).map(|m| self.carbs_at(m)).sum()
    }
}

/// Midnight (UTC) of the current calendar day.
#[must_use]
pub fn today_midnight_utc() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}
