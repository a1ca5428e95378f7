use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Adherex";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    "adherex=info,tower_http=warn".to_string()
}

/// Get the application data directory
/// ~/Adherex/ on all platforms (user-visible)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Adherex")
}

/// Path of the SQLite database file. Overridable via ADHEREX_DB.
pub fn database_path() -> PathBuf {
    match std::env::var("ADHEREX_DB") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => app_data_dir().join("adherex.db"),
    }
}

/// Socket address the API server binds to. Overridable via ADHEREX_ADDR.
pub fn bind_addr() -> SocketAddr {
    std::env::var("ADHEREX_ADDR")
        .ok()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
}

/// Gemini API key, if configured.
pub fn gemini_api_key() -> Option<String> {
    std::env::var("GEMINI_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
}

/// SMTP settings for outbound notification mail.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Read SMTP settings from MAIL_HOST / MAIL_PORT / MAIL_USER / MAIL_PASSWORD.
/// Returns `None` when the host or credentials are absent — the server then
/// runs without email notifications.
pub fn mail_config() -> Option<MailConfig> {
    let host = std::env::var("MAIL_HOST").ok().filter(|h| !h.is_empty())?;
    let user = std::env::var("MAIL_USER").ok().filter(|u| !u.is_empty())?;
    let password = std::env::var("MAIL_PASSWORD").ok()?;
    let port = std::env::var("MAIL_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(587);
    Some(MailConfig {
        host,
        port,
        user,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Adherex"));
    }

    #[test]
    fn default_database_path_under_app_data() {
        // Only meaningful when the override is unset in the test environment.
        if std::env::var("ADHEREX_DB").is_err() {
            assert!(database_path().starts_with(app_data_dir()));
        }
    }

    #[test]
    fn default_bind_addr_is_loopback() {
        if std::env::var("ADHEREX_ADDR").is_err() {
            assert!(bind_addr().ip().is_loopback());
        }
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
