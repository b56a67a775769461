//! Implementation of the `cofsync simulate` command.
//!
//! Seeds an in-memory inventory with a worn outfit and a second outfit
//! folder, wears the folder and prints the resulting COF with the events the
//! engine published on the way.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;

use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{AssetType, Config, FolderType, WearableType};
use crate::infrastructure::http::HttpAppearanceService;
use crate::infrastructure::memory::{InMemoryAssets, InMemoryInventory, RecordingAvatar};
use crate::services::appearance_events::AppearanceEvent;
use crate::services::appearance_manager::{AppearanceDeps, AppearanceManager};
use crate::services::server_sync::SyncState;

const WORN_OUTFIT: [(WearableType, &str); 7] = [
    (WearableType::Shape, "Default Shape"),
    (WearableType::Skin, "Default Skin"),
    (WearableType::Hair, "Default Hair"),
    (WearableType::Eyes, "Default Eyes"),
    (WearableType::Shirt, "Grey Tee"),
    (WearableType::Pants, "Jeans"),
    (WearableType::Socks, "Ankle Socks"),
];

const NEW_OUTFIT: [(WearableType, &str); 4] = [
    (WearableType::Shirt, "Silk Shirt"),
    (WearableType::Pants, "Slacks"),
    (WearableType::Shoes, "Oxfords"),
    (WearableType::Jacket, "Blazer"),
];

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Add the outfit to what is worn instead of replacing it
    #[arg(long)]
    pub append: bool,

    /// Wearable types of the new outfit whose assets cannot be loaded
    #[arg(long, value_delimiter = ',')]
    pub missing: Vec<WearableType>,

    /// Wearable types of the new outfit whose assets arrive after the wait deadline
    #[arg(long, value_delimiter = ',')]
    pub late: Vec<WearableType>,

    /// Override resolution.max_wearable_wait_secs
    #[arg(long)]
    pub wait_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CofRow {
    pub name: String,
    pub kind: String,
    pub order_tag: String,
}

#[derive(Debug, Serialize)]
pub struct SimulateOutput {
    pub outfit_changed: bool,
    pub cof: Vec<CofRow>,
    pub worn: Vec<String>,
    pub late_arrivals_applied: usize,
    pub sync: SyncState,
    pub events: Vec<AppearanceEvent>,
}

impl CommandOutput for SimulateOutput {
    fn to_human(&self) -> String {
        let mut cof = list_table(&["name", "kind", "order tag"]);
        for row in &self.cof {
            cof.add_row(vec![row.name.as_str(), row.kind.as_str(), row.order_tag.as_str()]);
        }

        let mut events = list_table(&["seq", "severity", "event"]);
        for event in &self.events {
            let payload = serde_json::to_value(&event.payload).unwrap_or_default();
            events.add_row(vec![
                event.sequence.to_string(),
                format!("{:?}", event.severity).to_lowercase(),
                payload["type"].as_str().unwrap_or_default().to_string(),
            ]);
        }

        let mut lines = vec![
            if self.outfit_changed {
                "Outfit change applied.".to_string()
            } else {
                "Outfit change did not complete.".to_string()
            },
            String::new(),
            render_list("COF link", &cof, self.cof.len()),
            String::new(),
            format!("Worn: {}", self.worn.join(", ")),
        ];
        if self.late_arrivals_applied > 0 {
            lines.push(format!("Late arrivals applied: {}", self.late_arrivals_applied));
        }
        lines.push(format!(
            "Server sync: requested {:?}, acknowledged {:?}",
            self.sync.last_requested, self.sync.last_acknowledged
        ));
        lines.push(String::new());
        lines.push(render_list("event", &events, self.events.len()));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SimulateArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if let Some(wait) = args.wait_secs {
        config.resolution.max_wearable_wait_secs = wait;
    }
    let late_delay = Duration::from_secs(config.resolution.max_wearable_wait_secs + 1);

    let inventory = Arc::new(InMemoryInventory::new());
    let assets = Arc::new(InMemoryAssets::new());
    let avatar = Arc::new(RecordingAvatar::new());
    let service = Arc::new(
        HttpAppearanceService::new(&config.server).context("Failed to build appearance client")?,
    );

    let root = inventory.root().context("inventory has no root folder")?;
    let cof = inventory.cof().context("inventory has no Current Outfit Folder")?;
    let clothing = inventory
        .system_folder(FolderType::Clothing)
        .context("inventory has no Clothing folder")?;

    for (wearable_type, name) in WORN_OUTFIT {
        let item = inventory.add_wearable(clothing, name, wearable_type);
        assets.register_item(&item);
        inventory.add_link(cof, &item, "");
    }

    let outfit = inventory.add_folder(root, FolderType::Outfit, "Evening");
    for (wearable_type, name) in NEW_OUTFIT {
        let item = inventory.add_wearable(outfit, name, wearable_type);
        if args.missing.contains(&wearable_type) {
            continue;
        }
        assets.register_item(&item);
        if args.late.contains(&wearable_type) {
            if let Some(asset_id) = item.asset_id {
                assets.delay(asset_id, late_delay);
            }
        }
    }
    inventory.add_object(outfit, "Pocket Watch", AssetType::Object);

    let deps = AppearanceDeps {
        store: inventory.clone(),
        assets,
        avatar: avatar.clone(),
        service,
    };
    let manager = AppearanceManager::bootstrap(deps, config)
        .await
        .context("Failed to start appearance manager")?;
    let mut receiver = manager.subscribe();

    let outfit_changed = if args.append {
        manager.add_category_to_current_outfit(outfit).await
    } else {
        manager.replace_current_outfit(outfit).await
    }
    .context("Outfit change failed")?;
    let late_arrivals_applied = manager.join_late_arrivals().await;

    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    let mut links = inventory.items_in(cof);
    crate::services::clothing_order::sort_by_order_tag(&mut links);
    let cof_rows = links
        .into_iter()
        .map(|link| CofRow {
            kind: link
                .wearable_type
                .map(|t| t.to_string())
                .or_else(|| link.asset_type.map(|t| t.to_string()))
                .unwrap_or_else(|| "broken link".to_string()),
            name: link.name,
            order_tag: link.description,
        })
        .collect();

    let result = SimulateOutput {
        outfit_changed,
        cof: cof_rows,
        worn: avatar.worn().into_iter().map(|w| w.name).collect(),
        late_arrivals_applied,
        sync: manager.sync_state(),
        events,
    };
    output(&result, json_mode);
    Ok(())
}
