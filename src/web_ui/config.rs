use std::net::SocketAddr;
use std::path::PathBuf;
use crate::config::Config;

/// Settings the HTTP server needs, cut out of the process configuration.
#[derive(Debug, Clone)]
pub struct WebUIConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl WebUIConfig {
    pub fn from_config(config: &Config) -> Self {
        // A configured origin only applies in production; development stays open.
        let cors_origin = if config.environment.is_production() {
            config.cors_origin.clone().filter(|origin| is_valid_origin(origin))
        } else {
            None
        };

        WebUIConfig {
            host: config.host.clone(),
            port: config.port,
            static_dir: config.static_dir.clone(),
            cors_origin,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{}:{}", host, self.port).parse()
    }
}

impl Default for WebUIConfig {
    fn default() -> Self {
        WebUIConfig {
            host: "0.0.0.0".to_string(),
            port: crate::config::DEFAULT_PORT,
            static_dir: PathBuf::from("public"),
            cors_origin: None,
        }
    }
}

/// `scheme://host[:port]` with nothing after it.
fn is_valid_origin(origin: &str) -> bool {
    match origin.parse::<warp::http::Uri>() {
        Ok(uri) => {
            matches!(uri.scheme_str(), Some("http") | Some("https"))
                && uri.host().is_some()
                && matches!(uri.path(), "" | "/")
                && uri.query().is_none()
        }
        Err(_) => false,
    }
}
