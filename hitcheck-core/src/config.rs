use crate::area::QuarterDiskRule;
use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitcheckConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub area: AreaConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Number of worker threads. 0 = number of CPU cores.
    #[serde(default)]
    pub workers: usize,
    /// Largest accepted Content-Length.
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
    /// Per-read buffer; also caps the request head.
    #[serde(default = "default_read_buffer")]
    pub read_buffer_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaConfig {
    #[serde(default)]
    pub quarter_disk: QuarterDiskRule,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_listen_addr() -> String { "0.0.0.0:9080".into() }
fn default_max_body() -> usize { 8192 }
fn default_read_buffer() -> usize { 8192 }

// ── Impls ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            workers: 0,
            max_body_bytes: default_max_body(),
            read_buffer_bytes: default_read_buffer(),
        }
    }
}

impl HitcheckConfig {
    /// Load configuration from YAML file + env overrides
    /// (`HITCHECK_SERVER__LISTEN_ADDR=...`).
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("HITCHECK_").split("__"))
            .extract()
    }

    /// Effective worker count (0 → available CPUs).
    pub fn effective_workers(&self) -> usize {
        if self.server.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.server.workers
        }
    }
}
