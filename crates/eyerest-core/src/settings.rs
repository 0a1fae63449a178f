//! User settings that travel with the account.
//!
//! These live in the preference store (not `config.toml`) because they are
//! synced between devices as one category.

use serde::{Deserialize, Serialize};

use crate::timer::{clamp_interval, DEFAULT_INTERVAL_MIN};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_interval")]
    pub interval_minutes: u32,
    #[serde(default)]
    pub sync_enabled: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub vibration_enabled: bool,
    #[serde(default)]
    pub blue_light_filter_enabled: bool,
    /// Overlay strength, 0..=100.
    #[serde(default = "default_blue_light_intensity")]
    pub blue_light_intensity: u8,
    #[serde(default = "default_true")]
    pub exercise_reminders_enabled: bool,
    /// Breaks per day the user aims for.
    #[serde(default = "default_daily_goal")]
    pub daily_goal: u32,
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL_MIN
}
fn default_true() -> bool {
    true
}
fn default_blue_light_intensity() -> u8 {
    30
}
fn default_daily_goal() -> u32 {
    8
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval(),
            sync_enabled: false,
            notifications_enabled: true,
            sound_enabled: true,
            vibration_enabled: true,
            blue_light_filter_enabled: false,
            blue_light_intensity: default_blue_light_intensity(),
            exercise_reminders_enabled: true,
            daily_goal: default_daily_goal(),
        }
    }
}

impl Settings {
    /// Bring every field into its valid range.
    pub fn normalized(mut self) -> Self {
        self.interval_minutes = clamp_interval(self.interval_minutes);
        self.blue_light_intensity = self.blue_light_intensity.min(100);
        self.daily_goal = self.daily_goal.max(1);
        self
    }

    /// Set one field by name from its string form.
    ///
    /// # Errors
    /// Returns a message if the key is unknown or the value does not parse.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), String> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
            value
                .parse()
                .map_err(|_| format!("invalid value '{value}' for setting '{key}'"))
        }

        match key {
            "interval_minutes" => self.interval_minutes = parse(key, value)?,
            "sync_enabled" => self.sync_enabled = parse(key, value)?,
            "notifications_enabled" => self.notifications_enabled = parse(key, value)?,
            "sound_enabled" => self.sound_enabled = parse(key, value)?,
            "vibration_enabled" => self.vibration_enabled = parse(key, value)?,
            "blue_light_filter_enabled" => self.blue_light_filter_enabled = parse(key, value)?,
            "blue_light_intensity" => self.blue_light_intensity = parse(key, value)?,
            "exercise_reminders_enabled" => self.exercise_reminders_enabled = parse(key, value)?,
            "daily_goal" => self.daily_goal = parse(key, value)?,
            _ => return Err(format!("unknown setting: {key}")),
        }
        *self = std::mem::take(self).normalized();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.interval_minutes, 20);
        assert!(!s.sync_enabled);
        assert_eq!(s.blue_light_intensity, 30);
    }

    #[test]
    fn set_field_parses_and_clamps() {
        let mut s = Settings::default();
        s.set_field("interval_minutes", "90").unwrap();
        assert_eq!(s.interval_minutes, 60);
        s.set_field("sync_enabled", "true").unwrap();
        assert!(s.sync_enabled);
        assert!(s.set_field("blue_light_intensity", "300").is_err());
        assert_eq!(s.blue_light_intensity, 30);
        s.set_field("blue_light_intensity", "120").unwrap();
        assert_eq!(s.blue_light_intensity, 100);
    }

    #[test]
    fn set_field_rejects_unknown_key() {
        let mut s = Settings::default();
        assert!(s.set_field("theme", "dark").is_err());
        assert!(s.set_field("sound_enabled", "maybe").is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s: Settings = serde_json::from_str(r#"{"sync_enabled":true}"#).unwrap();
        assert!(s.sync_enabled);
        assert_eq!(s.daily_goal, 8);
    }
}
