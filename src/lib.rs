use anyhow::Result;
use std::path::Path;

pub mod dispatcher;
pub mod error;
pub mod languages;
pub mod logging;
pub mod providers;
pub mod segmenter;
pub mod server;
pub mod settings;
pub mod translations;

pub use dispatcher::{
    ChunkRetry, ChunkTranslated, DispatchEvent, DispatchOptions, Dispatcher, InvocationSummary,
    OrderedTranslations, ProgressSink,
};
pub use error::TranslateError;
pub use providers::{Gemini, Provider};
pub use settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Every non-blank input line is one page fragment.
    Page,
    /// The whole input is one selected text.
    Selection,
    /// Answer a question about the input.
    Ask(String),
    ShowSettings,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub lang: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    pub max_chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub show_progress: bool,
}

/// Loads settings and applies the command line overrides on top.
pub fn load_config_settings(config: &Config) -> Result<Settings> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    apply_overrides(&mut settings, config);
    Ok(settings)
}

pub fn build_dispatcher(settings: &Settings) -> Dispatcher<Gemini> {
    build_dispatcher_with_client(settings, reqwest::Client::new())
}

pub fn build_dispatcher_with_client(
    settings: &Settings,
    client: reqwest::Client,
) -> Dispatcher<Gemini> {
    let key = settings.resolve_api_key(None).unwrap_or_default();
    let provider = Gemini::with_client(key, client)
        .with_model(settings.model.as_str())
        .with_base_url(settings.base_url.as_str());
    Dispatcher::new(provider, settings.dispatch_options())
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let settings = load_config_settings(&config)?;
    run_with_settings(&config, &settings, input.unwrap_or_default()).await
}

async fn run_with_settings(config: &Config, settings: &Settings, input: String) -> Result<String> {
    let target_lang = settings.target_lang.as_str();
    let output = match &config.mode {
        Mode::ShowSettings => format_settings(settings),
        Mode::Page => {
            let lines = input.lines().collect::<Vec<_>>();
            let fragments = lines
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            let mut progress = ConsoleProgress::new(&fragments, config.show_progress);
            build_dispatcher(settings)
                .translate_page(fragments, target_lang, &mut progress)
                .await?;
            stitch_lines(&lines, progress.ordered.into_translations())
        }
        Mode::Selection => {
            build_dispatcher(settings)
                .translate_selection(&input, target_lang)
                .await?
        }
        Mode::Ask(question) => {
            build_dispatcher(settings)
                .ask_question(&input, question, target_lang)
                .await?
        }
    };
    Ok(output)
}

fn apply_overrides(settings: &mut Settings, config: &Config) {
    if let Some(lang) = config.lang.as_deref().map(str::trim) {
        if !lang.is_empty() {
            settings.target_lang = lang.to_string();
        }
    }
    if let Some(model) = config.model.as_deref().map(str::trim) {
        if !model.is_empty() {
            settings.model = model.to_string();
        }
    }
    if let Some(key) = settings.resolve_api_key(config.key.as_deref()) {
        settings.api_key = Some(key);
    }
    if let Some(size) = config.max_chunk_size.filter(|value| *value > 0) {
        settings.max_chunk_size = size;
    }
    if let Some(limit) = config.concurrency.filter(|value| *value > 0) {
        settings.concurrency = limit;
    }
}

/// Puts translated fragments back in place of the non-blank input lines.
fn stitch_lines(lines: &[&str], translations: Vec<String>) -> String {
    let mut translations = translations.into_iter();
    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                translations
                    .next()
                    .unwrap_or_else(|| line.trim().to_string())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_settings(settings: &Settings) -> String {
    let key_state = if settings.resolve_api_key(None).is_some() {
        "set"
    } else {
        "not set"
    };
    let target = languages::language_name(&settings.target_lang)
        .map(|name| format!("{} ({})", settings.target_lang, name))
        .unwrap_or_else(|| settings.target_lang.clone());
    [
        format!("api_key\t{}", key_state),
        format!("model\t{}", settings.model),
        format!("base_url\t{}", settings.base_url),
        format!("source_lang\t{}", settings.source_lang),
        format!("target_lang\t{}", target),
        format!("selection_enabled\t{}", settings.selection_enabled),
        format!("max_chunk_size\t{}", settings.max_chunk_size),
        format!("concurrency\t{}", settings.concurrency),
        format!(
            "retry\t{} attempts, {}ms base, {}ms max",
            settings.retry_attempts, settings.retry_base_delay_ms, settings.retry_max_delay_ms
        ),
        format!("selection_timeout\t{}s", settings.selection_timeout_secs),
    ]
    .join("\n")
}

struct ConsoleProgress {
    ordered: OrderedTranslations,
    show_progress: bool,
}

impl ConsoleProgress {
    fn new(fragments: &[String], show_progress: bool) -> Self {
        Self {
            ordered: OrderedTranslations::new(fragments),
            show_progress,
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn apply_started(&mut self, total_chunks: usize, total_fragments: usize) {
        if self.show_progress {
            eprintln!(
                "translating {} fragments in {} chunks",
                total_fragments, total_chunks
            );
        }
    }

    fn apply_result(&mut self, result: ChunkTranslated) {
        if self.show_progress {
            let note = if result.fallback {
                " (kept original text)"
            } else {
                ""
            };
            eprintln!(
                "[{:>3}%] chunk {}{}",
                result.progress,
                result.chunk_index + 1,
                note
            );
        }
        self.ordered.apply_result(result);
    }

    fn apply_retry(&mut self, retry: ChunkRetry) {
        if self.show_progress {
            eprintln!(
                "chunk {} failed (attempt {}/{}), retrying in {}ms: {}",
                retry.chunk_index + 1,
                retry.attempt,
                retry.max_attempts,
                retry.delay_ms,
                retry.error
            );
        }
    }

    fn apply_completion(&mut self, summary: InvocationSummary) {
        self.ordered.apply_completion(summary);
    }
}
