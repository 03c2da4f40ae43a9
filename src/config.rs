use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::LazyLock};
use url::Url;

/// Where collections live between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Every successful mutation is written back to `<data_dir>/<key>.json`.
    File,
    /// Seeded from disk when a file exists; changes are kept in memory only.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub loglevel: String,
    pub data_dir: PathBuf,
    pub storage_mode: StorageMode,
    pub jwt_secret: String,
    pub jwt_expiry_secs: u64,
    /// Public origin of the web frontend, used to build links in outbound mail.
    pub base_url: Url,
    pub mail_relay_url: Option<Url>,
    pub mail_from: String,
    pub mail_per_minute: u32,
    pub mail_concurrency: usize,
    /// Offset from UTC in which host weekly schedules are written.
    pub schedule_utc_offset_minutes: i32,
    pub seed_admin: bool,
    pub admin_email: String,
    pub admin_password: String,
    pub admin_name: String,
    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            loglevel: "info".to_string(),
            data_dir: PathBuf::from("data"),
            storage_mode: StorageMode::File,
            jwt_secret: "change-me-portal-signing-secret-0123456789".to_string(),
            jwt_expiry_secs: 7 * 24 * 60 * 60,
            base_url: Url::parse("http://localhost:3000").expect("static base url"),
            mail_relay_url: None,
            mail_from: "Resident Portal <noreply@resident-portal.local>".to_string(),
            mail_per_minute: 30,
            mail_concurrency: 4,
            schedule_utc_offset_minutes: 0,
            seed_admin: true,
            admin_email: "admin@resident-portal.local".to_string(),
            admin_password: "Admin123!".to_string(),
            admin_name: "Administrator".to_string(),
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Defaults overlaid with `PORTAL_*` environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("PORTAL_"))
            .extract()
    }
}

pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("invalid PORTAL_* configuration: {e}"))
});
