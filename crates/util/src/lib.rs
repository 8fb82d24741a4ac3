pub mod config;

use std::{env, net::SocketAddr};

pub use config::{AppConfig, ConfigError, Environment, Secret};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Returns the address the HTTP server should bind to.
///
/// `APP_BIND_ADDR` wins when set. Otherwise a platform-provided `PORT` binds
/// every interface on that port, and [`DEFAULT_BIND_ADDR`] is the last resort.
pub fn server_bind_address() -> Result<SocketAddr, std::net::AddrParseError> {
    let value = match (env::var("APP_BIND_ADDR"), env::var("PORT")) {
        (Ok(addr), _) => addr,
        (Err(_), Ok(port)) => format!("0.0.0.0:{port}"),
        _ => DEFAULT_BIND_ADDR.to_string(),
    };
    value.parse()
}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));
