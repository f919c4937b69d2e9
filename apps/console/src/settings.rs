use std::{collections::HashSet, fs, num::NonZeroUsize, path::Path};

use anyhow::Context;
use dialog::DialogConfig;
use serde::Deserialize;
use shared::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub admin_ids: HashSet<UserId>,
    pub page_size: NonZeroUsize,
    pub private_chats_only: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        let dialog = DialogConfig::default();
        Self {
            database_url: "sqlite://./data/club.db".into(),
            admin_ids: dialog.admin_ids,
            page_size: dialog.page_size,
            private_chats_only: dialog.private_chats_only,
            log_level: "info".into(),
        }
    }
}

impl Settings {
    pub fn dialog_config(&self) -> DialogConfig {
        DialogConfig {
            admin_ids: self.admin_ids.clone(),
            page_size: self.page_size,
            private_chats_only: self.private_chats_only,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    database_url: Option<String>,
    admin_ids: Option<Vec<i64>>,
    page_size: Option<NonZeroUsize>,
    private_chats_only: Option<bool>,
    log_level: Option<String>,
}

/// Defaults, then `path` if it exists, then the environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(ids) = file_cfg.admin_ids {
        settings.admin_ids = ids.into_iter().map(UserId).collect();
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = v;
    }
    if let Some(v) = file_cfg.private_chats_only {
        settings.private_chats_only = v;
    }
    if let Some(v) = file_cfg.log_level {
        settings.log_level = v;
    }
    Ok(())
}

/// Unparseable values are skipped and the previous layer wins.
fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("APP__ADMIN_IDS") {
        let parsed: Result<HashSet<UserId>, _> = v
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| id.parse::<i64>().map(UserId))
            .collect();
        if let Ok(ids) = parsed {
            settings.admin_ids = ids;
        }
    }

    if let Some(v) = var("APP__PAGE_SIZE") {
        if let Ok(parsed) = v.parse::<NonZeroUsize>() {
            settings.page_size = parsed;
        }
    }

    if let Some(v) = var("APP__PRIVATE_CHATS_ONLY") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.private_chats_only = parsed;
        }
    }

    if let Some(v) = var("RUST_LOG") {
        settings.log_level = v;
    }
    if let Some(v) = var("APP__LOG_LEVEL") {
        settings.log_level = v;
    }
}

/// Turns a bare file path into a `sqlite://` url. The store creates the
/// file and its parent directory when it opens the url.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(
            normalize_database_url("./data/test.db"),
            "sqlite://./data/test.db"
        );
        assert_eq!(normalize_database_url("sqlite:club.db"), "sqlite://club.db");
        assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn file_then_env_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
            database_url = "sqlite://club.db"
            admin_ids = [7, 8]
            page_size = 6
            "#,
        )
        .expect("file");
        apply_env(
            &mut settings,
            env(&[("APP__ADMIN_IDS", "9, 10"), ("APP__PAGE_SIZE", "0")]),
        );

        assert_eq!(settings.database_url, "sqlite://club.db");
        assert_eq!(settings.admin_ids, HashSet::from([UserId(9), UserId(10)]));
        assert_eq!(settings.page_size.get(), 6);
        assert!(settings.private_chats_only);
    }

    #[test]
    fn malformed_admin_list_keeps_previous_value() {
        let mut settings = Settings::default();
        settings.admin_ids.insert(UserId(1));
        apply_env(&mut settings, env(&[("APP__ADMIN_IDS", "1,two")]));
        assert_eq!(settings.admin_ids, HashSet::from([UserId(1)]));
    }

    #[test]
    fn rejects_unknown_types_in_file() {
        let mut settings = Settings::default();
        assert!(apply_file(&mut settings, "page_size = \"many\"").is_err());
    }

    #[tokio::test]
    async fn normalized_path_opens_in_a_new_directory() {
        let temp_root = tempfile::tempdir().expect("tempdir");
        let db_path = temp_root.path().join("data").join("club.db");
        let raw = db_path.to_string_lossy().to_string();

        let url = normalize_database_url(&raw);
        assert_eq!(storage::sqlite_path(&url), Some(db_path.clone()));
        storage::Storage::new(&url).await.expect("open store");
        assert!(db_path.exists());
    }
}
