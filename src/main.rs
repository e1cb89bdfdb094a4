use std::io::{self, IsTerminal, Read};

use anyhow::Result;
use clap::Parser;

use gemini_page_translator::{Config, Mode};

#[derive(Parser, Debug)]
#[command(
    name = "gemini-page-translator",
    version,
    about = "Translate page text with Gemini in concurrent chunks"
)]
struct Cli {
    /// Target language code or name (default: from settings)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Gemini model name (e.g. gemini-2.5-flash)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides settings and environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Translate stdin as a single selected text
    #[arg(long = "selection", conflicts_with = "ask")]
    selection: bool,

    /// Answer a question about the text read from stdin
    #[arg(long = "ask", value_name = "QUESTION")]
    ask: Option<String>,

    /// Run the HTTP server on the given address (e.g. 127.0.0.1:11435)
    #[arg(long = "server", value_name = "ADDR")]
    server: Option<String>,

    /// Show effective settings and exit
    #[arg(long = "show-settings")]
    show_settings: bool,

    /// Maximum characters per chunk
    #[arg(long = "max-chunk-size")]
    max_chunk_size: Option<usize>,

    /// Maximum chunk requests in flight
    #[arg(long = "concurrency")]
    concurrency: Option<usize>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.show_settings {
            Mode::ShowSettings
        } else if let Some(question) = &self.ask {
            Mode::Ask(question.clone())
        } else if self.selection {
            Mode::Selection
        } else {
            Mode::Page
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    gemini_page_translator::logging::init(cli.verbose)?;

    let config = Config {
        mode: cli.mode(),
        lang: cli.lang.clone(),
        model: cli.model.clone(),
        key: cli.key.clone(),
        settings_path: cli.read_settings.clone(),
        max_chunk_size: cli.max_chunk_size,
        concurrency: cli.concurrency,
        show_progress: io::stderr().is_terminal() || cli.verbose,
    };

    if let Some(addr) = cli.server {
        let settings = gemini_page_translator::load_config_settings(&config)?;
        return gemini_page_translator::server::run_server(settings, addr).await;
    }

    let input = if config.mode == Mode::ShowSettings {
        None
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    };

    let output = gemini_page_translator::run(config, input).await?;
    println!("{}", output);
    Ok(())
}
