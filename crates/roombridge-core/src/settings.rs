use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::sdk::TrackSettings;

pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://auth.100ms.live/v2/token";
const FALLBACK_DISPLAY_NAME: &str = "Guest";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub display_name: Option<String>,
    /// SDK init endpoint override, passed as `endpoint` on preview/join.
    #[serde(default)]
    pub init_endpoint: Option<String>,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_true")]
    pub mic_enabled_on_join: bool,
    #[serde(default)]
    pub camera_enabled_on_join: bool,
}

fn default_true() -> bool {
    true
}

fn default_token_endpoint() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_name: None,
            init_endpoint: None,
            token_endpoint: default_token_endpoint(),
            mic_enabled_on_join: true,
            camera_enabled_on_join: false,
        }
    }
}

impl Settings {
    pub fn display_name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_DISPLAY_NAME)
    }

    /// Credential object accepted by preview and join.
    pub fn credentials(&self, auth_token: &str) -> Value {
        let mut map = Map::new();
        map.insert("username".into(), json!(self.display_name_or_default()));
        map.insert("authToken".into(), json!(auth_token));
        if let Some(endpoint) = &self.init_endpoint {
            map.insert("endpoint".into(), json!(endpoint));
        }
        Value::Object(map)
    }

    pub fn track_settings(&self) -> TrackSettings {
        TrackSettings {
            audio_muted_on_join: !self.mic_enabled_on_join,
            video_muted_on_join: !self.camera_enabled_on_join,
            use_hardware_echo_cancellation: false,
        }
    }
}

pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Settings {
        self.lock().clone()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.lock().display_name = name;
        self.save();
    }

    pub fn set_init_endpoint(&self, endpoint: Option<String>) {
        self.lock().init_endpoint = endpoint;
        self.save();
    }

    pub fn set_token_endpoint(&self, endpoint: String) {
        self.lock().token_endpoint = endpoint;
        self.save();
    }

    pub fn set_mic_enabled_on_join(&self, enabled: bool) {
        self.lock().mic_enabled_on_join = enabled;
        self.save();
    }

    pub fn set_camera_enabled_on_join(&self, enabled: bool) {
        self.lock().camera_enabled_on_join = enabled;
        self.save();
    }

    fn save(&self) {
        let settings = self.get();
        if let Some(parent) = self.file_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&settings) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::warn!("failed to write settings: {e}");
                }
            }
            Err(e) => tracing::warn!("failed to encode settings: {e}"),
        }
    }

    fn load(path: &Path) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Settings::default(),
        }
    }
}
