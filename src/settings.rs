use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatcher::DispatchOptions;
use crate::providers::retry::RetryPolicy;
use crate::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".gemini-page-translator";
const LOCAL_SETTINGS_FILE: &str = "settings.local.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub source_lang: String,
    pub target_lang: String,
    pub selection_enabled: bool,
    pub max_chunk_size: usize,
    pub concurrency: usize,
    pub retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub selection_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            source_lang: "auto".to_string(),
            target_lang: "ko".to_string(),
            selection_enabled: true,
            max_chunk_size: 2000,
            concurrency: 3,
            retry_attempts: 3,
            retry_base_delay_ms: 2000,
            retry_max_delay_ms: 30000,
            selection_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct SettingsFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    gemini: Option<GeminiSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translate: Option<TranslateSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatch: Option<DispatchSettings>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct GeminiSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TranslateSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct DispatchSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_chunk_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    concurrency: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_attempts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_base_delay_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_max_delay_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_timeout_secs: Option<i64>,
}

/// The subset of settings a user edits from a client (key and languages).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettingsUpdate {
    pub api_key: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    #[serde(alias = "selectionTranslateEnabled")]
    pub selection_enabled: Option<bool>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from(LOCAL_SETTINGS_FILE),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join(LOCAL_SETTINGS_FILE));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    load_settings_from(&ordered_paths)
}

/// Merges every existing file of `paths` over the defaults, later files
/// winning.
pub fn load_settings_from(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }
    Ok(settings)
}

/// Default location of user edited settings.
pub fn user_settings_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(LOCAL_SETTINGS_FILE))
}

/// Writes `update` into the TOML file at `path`, keeping whatever else the
/// file already contains.
pub fn save_user_settings(path: &Path, update: &UserSettingsUpdate) -> Result<()> {
    let mut file = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings: {}", path.display()))?;
        toml::from_str::<SettingsFile>(&content)
            .with_context(|| format!("failed to parse settings: {}", path.display()))?
    } else {
        SettingsFile::default()
    };

    if let Some(key) = update.api_key.as_deref() {
        file.gemini.get_or_insert_with(GeminiSettings::default).api_key =
            Some(key.trim().to_string());
    }
    let translate = file
        .translate
        .get_or_insert_with(TranslateSettings::default);
    if let Some(lang) = non_empty(update.source_lang.as_deref()) {
        translate.source_lang = Some(lang);
    }
    if let Some(lang) = non_empty(update.target_lang.as_deref()) {
        translate.target_lang = Some(lang);
    }
    if let Some(enabled) = update.selection_enabled {
        translate.selection_enabled = Some(enabled);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create settings directory: {}", parent.display())
        })?;
    }
    let content = toml::to_string_pretty(&file).with_context(|| "failed to encode settings")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write settings: {}", path.display()))?;
    Ok(())
}

impl Settings {
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            max_chunk_size: self.max_chunk_size,
            concurrency: self.concurrency,
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
            selection_timeout: Duration::from_secs(self.selection_timeout_secs),
        }
    }

    /// Explicit override, then the settings files, then the environment.
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> Option<String> {
        non_empty(override_key)
            .or_else(|| non_empty(self.api_key.as_deref()))
            .or_else(|| get_env("GEMINI_API_KEY"))
            .or_else(|| get_env("GOOGLE_API_KEY"))
    }

    pub fn apply_update(&mut self, update: &UserSettingsUpdate) {
        if let Some(key) = update.api_key.as_deref() {
            self.api_key = non_empty(Some(key));
        }
        if let Some(lang) = non_empty(update.source_lang.as_deref()) {
            self.source_lang = lang;
        }
        if let Some(lang) = non_empty(update.target_lang.as_deref()) {
            self.target_lang = lang;
        }
        if let Some(enabled) = update.selection_enabled {
            self.selection_enabled = enabled;
        }
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(gemini) = incoming.gemini {
            if let Some(key) = gemini.api_key {
                if !key.trim().is_empty() {
                    self.api_key = Some(key.trim().to_string());
                }
            }
            if let Some(model) = non_empty(gemini.model.as_deref()) {
                self.model = model;
            }
            if let Some(url) = non_empty(gemini.base_url.as_deref()) {
                self.base_url = url;
            }
        }
        if let Some(translate) = incoming.translate {
            if let Some(lang) = non_empty(translate.source_lang.as_deref()) {
                self.source_lang = lang;
            }
            if let Some(lang) = non_empty(translate.target_lang.as_deref()) {
                self.target_lang = lang;
            }
            if let Some(enabled) = translate.selection_enabled {
                self.selection_enabled = enabled;
            }
        }
        if let Some(dispatch) = incoming.dispatch {
            if let Some(size) = positive(dispatch.max_chunk_size) {
                self.max_chunk_size = size as usize;
            }
            if let Some(limit) = positive(dispatch.concurrency) {
                self.concurrency = limit as usize;
            }
            if let Some(attempts) = positive(dispatch.retry_attempts) {
                self.retry_attempts = attempts as usize;
            }
            if let Some(delay) = positive(dispatch.retry_base_delay_ms) {
                self.retry_base_delay_ms = delay;
            }
            if let Some(delay) = positive(dispatch.retry_max_delay_ms) {
                self.retry_max_delay_ms = delay;
            }
            if let Some(secs) = positive(dispatch.selection_timeout_secs) {
                self.selection_timeout_secs = secs;
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn positive(value: Option<i64>) -> Option<u64> {
    value.filter(|value| *value > 0).map(|value| value as u64)
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
