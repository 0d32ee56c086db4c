//! Process-level configuration: the §6 session/history knobs from
//! `collab_common::ServerConfig`, plus the bind address this binary owns.

use std::net::SocketAddr;

pub use collab_common::ServerConfig;

/// Everything `main` needs to start listening, on top of the shared
/// session/history knobs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3001);
        Self {
            server: ServerConfig::from_env(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}
