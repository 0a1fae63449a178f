use clap::Subcommand;

use super::{open_service, print_events, print_json, CmdResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Get a setting value
    Get {
        /// Setting name (e.g. "interval_minutes", "sync_enabled")
        key: String,
    },
    /// Set a setting value; synced to other devices when sync is on
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },
    /// List all settings
    List,
    /// Restore default settings
    Reset,
}

pub async fn run(action: SettingsAction) -> CmdResult {
    let svc = open_service()?;

    match action {
        SettingsAction::Get { key } => {
            let settings = serde_json::to_value(svc.settings()?)?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown setting: {key}").into()),
            }
        }
        SettingsAction::Set { key, value } => {
            let events = svc.set_setting(&key, &value)?;
            print_events(&events)?;
        }
        SettingsAction::List => {
            print_json(&svc.settings()?)?;
        }
        SettingsAction::Reset => {
            let sync_enabled = svc.settings()?.sync_enabled;
            let events = svc.update_settings(eyerest_core::Settings {
                sync_enabled,
                ..Default::default()
            })?;
            print_events(&events)?;
        }
    }

    svc.flush().await;
    Ok(())
}
