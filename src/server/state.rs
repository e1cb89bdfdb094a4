use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::providers::Gemini;
use crate::settings::Settings;
use crate::{Dispatcher, build_dispatcher_with_client};

pub(crate) struct ServerState {
    pub(crate) settings: RwLock<Settings>,
    /// Where `POST /settings` persists user edits; `None` keeps them in memory.
    pub(crate) user_settings_path: Option<PathBuf>,
    client: reqwest::Client,
}

impl ServerState {
    pub(crate) fn new(settings: Settings, user_settings_path: Option<PathBuf>) -> Self {
        Self::with_client(settings, user_settings_path, reqwest::Client::new())
    }

    pub(crate) fn with_client(
        settings: Settings,
        user_settings_path: Option<PathBuf>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            settings: RwLock::new(settings),
            user_settings_path,
            client,
        }
    }

    pub(crate) async fn snapshot(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// A dispatcher built from the settings as they are right now, so saved
    /// changes apply to the next request. All dispatchers share one client.
    pub(crate) async fn dispatcher(&self) -> (Dispatcher<Gemini>, Settings) {
        let settings = self.snapshot().await;
        (
            build_dispatcher_with_client(&settings, self.client.clone()),
            settings,
        )
    }
}
