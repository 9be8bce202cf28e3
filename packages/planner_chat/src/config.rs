use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    port = 9090
//
//   env var:         PLANNER_SERVER__PORT=9090   (double underscore = nesting)
//
//   CLI flags (--host/--port) override both.

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Where the chat server lives (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Use wss/https instead of ws/http.
    #[serde(default)]
    pub tls: bool,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            upload_path: default_upload_path(),
            tls: false,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_upload_path() -> String {
    "/api/upload".to_string()
}

impl FileConfig {
    pub fn ws_url(&self) -> String {
        let scheme = if self.server.tls { "wss" } else { "ws" };
        format!(
            "{scheme}://{}:{}{}",
            self.server.host, self.server.port, self.server.ws_path
        )
    }

    pub fn upload_url(&self) -> String {
        let scheme = if self.server.tls { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}{}",
            self.server.host, self.server.port, self.server.upload_path
        )
    }
}

/// Build a figment that layers: defaults → config.toml → PLANNER_* env
/// vars. Env vars use double-underscore for nesting into sections:
///   `PLANNER_SERVER__HOST=chat.example.com`  →  `server.host`
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("PLANNER_").split("__"))
}
