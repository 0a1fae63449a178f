//! Sync subcommand for mirroring state to the remote document store.

use clap::Subcommand;
use eyerest_core::SyncCategory;

use super::{open_service, print_events, print_json, CmdResult};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show account, device and subscription state
    Status,
    /// Upload local state, overwriting the remote documents
    Push {
        /// Single category (settings, statistics, achievements, timer)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Download remote documents, overwriting local state
    Pull {
        /// Single category (settings, statistics, achievements, timer)
        #[arg(short, long)]
        category: Option<String>,
    },
}

fn parse_category(name: Option<&str>) -> Result<Option<SyncCategory>, Box<dyn std::error::Error>> {
    match name {
        None => Ok(None),
        Some(name) => SyncCategory::parse(name).map(Some).ok_or_else(|| {
            format!(
                "Unknown category: {name}. Valid categories: settings, statistics, achievements, timer"
            )
            .into()
        }),
    }
}

pub async fn run(action: SyncAction) -> CmdResult {
    let svc = open_service()?;
    let sync = svc.sync();

    match action {
        SyncAction::Status => {
            print_json(&sync.status())?;
        }
        SyncAction::Push { category } => {
            if !sync.is_active() {
                return Err("sync is not active: sign in (config set account.user_id) and enable it (settings set sync_enabled true)".into());
            }
            match parse_category(category.as_deref())? {
                Some(category) => sync.upload(category).await?,
                None => sync.upload_all().await?,
            }
            println!("ok");
        }
        SyncAction::Pull { category } => {
            let events: Vec<_> = match parse_category(category.as_deref())? {
                Some(category) => sync.download(category).await?.into_iter().collect(),
                None => sync.download_all().await?,
            };
            print_events(&events)?;
        }
    }
    Ok(())
}
