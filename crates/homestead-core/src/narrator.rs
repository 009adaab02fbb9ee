//! Descriptive text for log output.
//!
//! A [`Narrator`] turns a `(season, time of day)` pair into a sentence. The
//! clock logs it on season changes. Nothing in the simulation reads it
//! back.

use homestead_types::{Season, TimeOfDay};

/// Flavor text lookup keyed by season and time of day.
pub trait Narrator: Send + Sync {
    /// Describe the moment.
    fn describe(&self, season: Season, time_of_day: TimeOfDay) -> String;
}

/// Names the season and time of day and nothing more.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNarrator;

impl Narrator for PlainNarrator {
    fn describe(&self, season: Season, time_of_day: TimeOfDay) -> String {
        format!("{} {}", season_name(season), time_name(time_of_day))
    }
}

const fn season_name(season: Season) -> &'static str {
    match season {
        Season::Spring => "spring",
        Season::Summer => "summer",
        Season::Fall => "fall",
        Season::Winter => "winter",
    }
}

const fn time_name(time_of_day: TimeOfDay) -> &'static str {
    match time_of_day {
        TimeOfDay::Dawn => "dawn",
        TimeOfDay::Morning => "morning",
        TimeOfDay::Afternoon => "afternoon",
        TimeOfDay::Dusk => "dusk",
        TimeOfDay::Night => "night",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_narrator_names_the_pair() {
        assert_eq!(
            PlainNarrator.describe(Season::Winter, TimeOfDay::Dusk),
            "winter dusk"
        );
    }
}
