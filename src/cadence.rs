/// Cadence gate
///
/// Decides from the current UTC time whether a category is due on this
/// tick. Schedules are plain data so the category table can carry them.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourMinute {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Every tick
    #[default]
    Always,
    /// Hours divisible by `hours`
    EveryHours { hours: u32 },
    /// Listed hours of the day
    AtHours { hours: Vec<u32> },
    /// Exact hour and minute matches
    AtTimes { times: Vec<HourMinute> },
}

impl Schedule {
    pub fn should_run(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        match self {
            Schedule::Always => true,
            // a zero interval never fires
            Schedule::EveryHours { hours } => *hours != 0 && hour % hours == 0,
            Schedule::AtHours { hours } => hours.contains(&hour),
            Schedule::AtTimes { times } => times
                .iter()
                .any(|t| t.hour == hour && t.minute == now.minute()),
        }
    }

    /// Short human description for logs
    pub fn describe(&self) -> String {
        match self {
            Schedule::Always => "every run".to_string(),
            Schedule::EveryHours { hours } => format!("every {} hours", hours),
            Schedule::AtHours { hours } => {
                let list: Vec<String> = hours.iter().map(|h| format!("{:02}:xx", h)).collect();
                format!("at {}", list.join(", "))
            }
            Schedule::AtTimes { times } => {
                let list: Vec<String> = times
                    .iter()
                    .map(|t| format!("{:02}:{:02}", t.hour, t.minute))
                    .collect();
                format!("at {}", list.join(", "))
            }
        }
    }
}
