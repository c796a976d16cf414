mod settings;

pub use settings::{BillingSettings, Config, Institute, StoreSettings};

use crate::error::{Result, TuitionError};
use crate::store::{JsonFileBackend, RecordStore};
use crate::validation;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (XDG config dir, or ~/.tuition/)
pub fn config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "tuition") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    let home = dirs_home().ok_or_else(|| {
        TuitionError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".tuition"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand ~ in paths
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve the data directory; relative paths hang off the config directory
pub fn resolve_data_dir(data_dir: &str, config_dir: &Path) -> PathBuf {
    let expanded = expand_path(data_dir);
    if expanded.is_absolute() {
        expanded
    } else {
        config_dir.join(expanded)
    }
}

/// Load config.toml
pub fn load_config(config_dir: &Path) -> Result<Config> {
    if !config_dir.exists() {
        return Err(TuitionError::ConfigNotFound(config_dir.to_path_buf()));
    }
    let path = config_dir.join("config.toml");
    if !path.exists() {
        return Err(TuitionError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    let config: Config =
        toml::from_str(&content).map_err(|e| TuitionError::ConfigParse { path, source: e })?;
    validation::cutoff_day(config.billing.schedule.cutoff_day)?;
    Ok(config)
}

/// Open the record store configured for this directory
pub fn open_store(config_dir: &Path, config: &Config) -> Result<RecordStore<JsonFileBackend>> {
    let data_dir = resolve_data_dir(&config.store.data_dir, config_dir);
    RecordStore::open(JsonFileBackend::new(data_dir))
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[institute]
name = "Your Institute Name"
currency_symbol = "$"

[billing]
# Admissions after this day of the month are first billed the next month
cutoff_day = 20
# Which installment absorbs rounding: "last" or "first"
surplus = "last"
# Installment count used when --installments is passed without a number
default_installments = 3

[store]
# Relative paths are resolved against this config directory
data_dir = "data"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::SurplusPlacement;
    use tempfile::TempDir;

    #[test]
    fn template_parses_with_defaults() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.billing.schedule.cutoff_day, 20);
        assert_eq!(config.billing.schedule.surplus, SurplusPlacement::Last);
        assert_eq!(config.billing.default_installments, 3);
        assert_eq!(config.store.data_dir, "data");
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str("[institute]\nname = \"X\"\n").unwrap();
        assert_eq!(config.institute.currency_symbol, "$");
        assert_eq!(config.billing.schedule.cutoff_day, 20);
        assert_eq!(config.billing.default_installments, 3);
    }

    #[test]
    fn rejects_out_of_range_cutoff() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.toml"),
            "[institute]\nname = \"X\"\n[billing]\ncutoff_day = 40\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(temp.path()),
            Err(TuitionError::InvalidInput(_))
        ));
    }

    #[test]
    fn relative_data_dir_hangs_off_config_dir() {
        let base = Path::new("/etc/tuition");
        assert_eq!(resolve_data_dir("data", base), base.join("data"));
        assert_eq!(resolve_data_dir("/var/lib/t", base), PathBuf::from("/var/lib/t"));
    }
}
