use std::env;
use tracing::warn;

const DEFAULT_M3U_FILE_NAME: &str = "iptv.m3u";

/// Paths the router serves itself; a playlist name equal to one of these
/// would overlap its route
const RESERVED_PATHS: [&str; 6] = [
    "health",
    "metrics",
    "ready",
    "live",
    "player_api.php",
    "xmltv.php",
];

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,

    // Proxy-facing identity
    pub user: String,
    pub password: String,
    pub hostname: String,
    pub advertised_port: u16,
    pub https: bool,

    // Xtream backend
    pub xtream_base_url: Option<String>,
    pub xtream_user: String,
    pub xtream_password: String,
    pub xtream_user_agent: String,
    pub xtream_timeout_secs: u64,

    // M3U
    pub m3u_file_name: String,
    pub m3u_proxified_path: String,
    pub m3u_source_path: Option<String>,
}

/// Proxy-facing settings shared read-only by every request handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub user: String,
    pub password: String,
    pub hostname: String,
    pub advertised_port: u16,
    pub https: bool,
}

impl ProxyConfig {
    /// "https" when the proxy is advertised behind TLS, "http" otherwise
    pub fn protocol(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// Exact comparison against the configured credential pair
    pub fn credentials_match(&self, user: &str, password: &str) -> bool {
        self.user == user && self.password == password
    }
}

/// Playlist download name, mounted as a single static path segment
///
/// Names that are empty, span several segments, look like a route parameter
/// or shadow another route fall back to the default.
fn m3u_file_name(raw: Option<String>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_M3U_FILE_NAME.to_string();
    };
    let name = raw.trim().trim_start_matches('/');

    let usable = !name.is_empty()
        && !name.contains('/')
        && !name.starts_with(':')
        && !name.starts_with('*')
        && !RESERVED_PATHS.contains(&name);

    if usable {
        name.to_string()
    } else {
        warn!(
            "M3U_FILE_NAME '{}' cannot be served as a playlist path; using '{}'",
            raw, DEFAULT_M3U_FILE_NAME
        );
        DEFAULT_M3U_FILE_NAME.to_string()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Self {
            // Server
            port,

            // Proxy-facing identity
            user: env::var("USER").unwrap_or_else(|_| "usertest".to_string()),
            password: env::var("PASSWORD").unwrap_or_else(|_| "passwordtest".to_string()),
            hostname: env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            advertised_port: env::var("ADVERTISED_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(port),
            https: env::var("HTTPS").map(|v| parse_bool(&v)).unwrap_or(false),

            // Xtream backend
            xtream_base_url: env::var("XTREAM_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            xtream_user: env::var("XTREAM_USER").unwrap_or_default(),
            xtream_password: env::var("XTREAM_PASSWORD").unwrap_or_default(),
            // VLC user agent avoids IPTV server blocks
            xtream_user_agent: env::var("XTREAM_USER_AGENT")
                .unwrap_or_else(|_| "VLC/3.0.20 LibVLC/3.0.20".to_string()),
            xtream_timeout_secs: env::var("XTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // M3U
            m3u_file_name: m3u_file_name(env::var("M3U_FILE_NAME").ok()),
            m3u_proxified_path: env::var("M3U_PROXIFIED_PATH")
                .unwrap_or_else(|_| "./iptv.m3u".to_string()),
            m3u_source_path: env::var("M3U_SOURCE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn protocol(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// Immutable proxy-facing view handed to the request handlers
    pub fn proxy(&self) -> ProxyConfig {
        ProxyConfig {
            user: self.user.clone(),
            password: self.password.clone(),
            hostname: self.hostname.clone(),
            advertised_port: self.advertised_port,
            https: self.https,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(https: bool) -> ProxyConfig {
        ProxyConfig {
            user: "proxyuser".to_string(),
            password: "proxypass".to_string(),
            hostname: "iptv.example.com".to_string(),
            advertised_port: 8443,
            https,
        }
    }

    #[test]
    fn test_protocol() {
        assert_eq!(proxy(false).protocol(), "http");
        assert_eq!(proxy(true).protocol(), "https");
    }

    #[test]
    fn test_credentials_match_is_exact() {
        let config = proxy(false);
        assert!(config.credentials_match("proxyuser", "proxypass"));
        assert!(!config.credentials_match("ProxyUser", "proxypass"));
        assert!(!config.credentials_match("proxyuser", "proxypass "));
        assert!(!config.credentials_match("", ""));
    }

    #[test]
    fn test_m3u_file_name() {
        assert_eq!(m3u_file_name(None), "iptv.m3u");
        assert_eq!(m3u_file_name(Some("list.m3u".into())), "list.m3u");
        assert_eq!(m3u_file_name(Some("/list.m3u".into())), "list.m3u");

        for clashing in [
            "player_api.php",
            "xmltv.php",
            "health",
            "live",
            "",
            "a/b.m3u",
            ":name",
            "*rest",
        ] {
            assert_eq!(m3u_file_name(Some(clashing.into())), "iptv.m3u", "{}", clashing);
        }
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool(" YES "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
