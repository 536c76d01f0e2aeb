//! Clock configuration: slot windows, time-cost categories, defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 1440;

/// A named window of the day, `[start, end)` in minutes-of-day.
///
/// A window may wrap midnight (`start > end`), e.g. night = 1320..360.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotWindow {
    pub id: String,
    pub start: u32,
    pub end: u32,
}

impl SlotWindow {
    pub fn contains(&self, minutes_of_day: u32) -> bool {
        if self.start <= self.end {
            (self.start..self.end).contains(&minutes_of_day)
        } else {
            minutes_of_day >= self.start || minutes_of_day < self.end
        }
    }

    /// Window length in minutes, accounting for midnight wrap.
    pub fn length(&self) -> u32 {
        if self.start <= self.end {
            self.end - self.start
        } else {
            MINUTES_PER_DAY - self.start + self.end
        }
    }

    /// Minutes from `minutes_of_day` (assumed inside the window) to the
    /// window's end boundary.
    pub fn minutes_until_end(&self, minutes_of_day: u32) -> u32 {
        if self.start <= self.end {
            self.end - minutes_of_day
        } else if minutes_of_day >= self.start {
            MINUTES_PER_DAY - minutes_of_day + self.end
        } else {
            self.end - minutes_of_day
        }
    }
}

/// Fallback time costs by action kind, plus the conversation visit cap.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeDefaults {
    /// Cost when no kind-specific default applies.
    #[serde(default)]
    pub default: u32,
    /// Per-action-kind default minutes (keys are action-type names).
    #[serde(default)]
    pub kinds: BTreeMap<String, u32>,
    /// Cumulative cap on default-cost minutes within one node visit.
    #[serde(default)]
    pub cap_per_visit: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Ordered slot windows; empty means slots are unused.
    #[serde(default)]
    pub slot_windows: Vec<SlotWindow>,
    /// Named time-cost categories in minutes (e.g. "brief": 5).
    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
    #[serde(default)]
    pub defaults: TimeDefaults,
    /// Week-day names; day 1 falls on `weekdays[start_weekday]`.
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<String>,
    #[serde(default)]
    pub start_weekday: usize,
}

fn default_weekdays() -> Vec<String> {
    ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl TimeConfig {
    /// Slot containing `minutes_of_day`, or `None` when slots are unused.
    pub fn slot_at(&self, minutes_of_day: u32) -> Option<&SlotWindow> {
        self.slot_windows
            .iter()
            .find(|w| w.contains(minutes_of_day))
    }

    pub fn weekday_for(&self, day: u32) -> &str {
        if self.weekdays.is_empty() {
            return "";
        }
        let idx = (self.start_weekday + day.saturating_sub(1) as usize) % self.weekdays.len();
        &self.weekdays[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn night() -> SlotWindow {
        SlotWindow {
            id: "night".into(),
            start: 1320,
            end: 360,
        }
    }

    #[test]
    fn wrapping_window_contains_both_sides_of_midnight() {
        let w = night();
        assert!(w.contains(1400));
        assert!(w.contains(0));
        assert!(w.contains(359));
        assert!(!w.contains(360));
        assert!(!w.contains(720));
    }

    #[test]
    fn wrapping_window_length_and_remainder() {
        let w = night();
        assert_eq!(w.length(), 480);
        assert_eq!(w.minutes_until_end(1320), 480);
        assert_eq!(w.minutes_until_end(0), 360);
    }

    #[test]
    fn weekday_cycles_from_start() {
        let cfg = TimeConfig {
            start_weekday: 5,
            ..TimeConfig::default()
        };
        assert_eq!(cfg.weekday_for(1), "sat");
        assert_eq!(cfg.weekday_for(2), "sun");
        assert_eq!(cfg.weekday_for(3), "mon");
    }
}
