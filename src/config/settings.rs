use serde::{Deserialize, Serialize};

use crate::billing::ScheduleSettings;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub institute: Institute,
    #[serde(default)]
    pub billing: BillingSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Institute {
    pub name: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BillingSettings {
    #[serde(flatten)]
    pub schedule: ScheduleSettings,
    /// Used by `admit`/`quote` when `--installments` is given without a count
    #[serde(default = "default_installments")]
    pub default_installments: u32,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            schedule: ScheduleSettings::default(),
            default_installments: default_installments(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreSettings {
    /// Relative paths are resolved against the config directory
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_installments() -> u32 {
    3
}

fn default_data_dir() -> String {
    "data".to_string()
}
