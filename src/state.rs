//! # Application State Module
//!
//! The single snapshot of inventory, recipes and production tasks that the
//! web and mobile clients synchronize with. It is decoded leniently: a
//! section of the wrong shape is dropped instead of rejecting the whole
//! snapshot, and individual malformed entries are skipped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::inventory::InventoryItem;
use crate::recipes::{Recipe, RecipeBook};
use crate::storage::BlobStore;
use crate::tasks::{ProductionTask, TaskBoard};

/// Storage key of the snapshot, shared with the clients' local storage
pub const STORAGE_KEY: &str = "chefcode:v1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub recipes: RecipeBook,
    #[serde(flatten)]
    pub board: TaskBoard,
}

impl AppData {
    /// Decode a snapshot sent by a client or read from storage
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut root) = value else {
            warn!("Snapshot is not a JSON object, starting empty");
            return Self::default();
        };

        let inventory = decode_list::<InventoryItem>(root.remove("inventory"), "inventory");
        let tasks = decode_list::<ProductionTask>(root.remove("tasks"), "tasks");

        let mut recipes = RecipeBook::new();
        match root.remove("recipes") {
            Some(Value::Object(entries)) => {
                for (name, raw) in entries {
                    match serde_json::from_value::<Recipe>(raw) {
                        Ok(recipe) => {
                            recipes.insert(name, recipe);
                        }
                        Err(e) => warn!(recipe = %name, error = %e, "Skipping malformed recipe"),
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => warn!("Snapshot recipes is not an object, ignoring it"),
        }

        let next_task_id = root
            .get("nextTaskId")
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map_or(1, |n| n as u64);

        let mut data = Self {
            inventory,
            recipes,
            board: TaskBoard {
                tasks,
                next_task_id,
            },
        };
        data.board.reindex();
        data
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("Snapshot is not valid JSON")?;
        Ok(Self::from_value(value))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize snapshot")
    }

    /// Load the snapshot from `store`, or an empty one if none was saved
    pub fn load(store: &dyn BlobStore) -> Result<Self> {
        match store.load(STORAGE_KEY)? {
            Some(raw) => {
                let data = Self::from_json(&raw)?;
                info!(
                    inventory = data.inventory.len(),
                    recipes = data.recipes.len(),
                    tasks = data.board.tasks.len(),
                    "Loaded snapshot"
                );
                Ok(data)
            }
            None => {
                info!("No saved snapshot, starting empty");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, store: &dyn BlobStore) -> Result<()> {
        store.save(STORAGE_KEY, &self.to_json()?)
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(value: Option<Value>, section: &str) -> Vec<T> {
    match value {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<T>(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(section, error = %e, "Skipping malformed snapshot entry");
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            warn!(section, "Snapshot section is not an array, ignoring it");
            Vec::new()
        }
    }
}
