use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub laudiolin: LaudiolinConfig,
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default = "RenderOptions::status_default")]
    pub status: RenderOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            laudiolin: LaudiolinConfig::default(),
            render: RenderOptions::default(),
            status: RenderOptions::status_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    /// Answer client errors (and the `/status` fallback card) with HTTP 500.
    #[serde(default = "default_true")]
    pub legacy_error_status: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port(), assets_dir: default_assets_dir(), legacy_error_status: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaudiolinConfig {
    /// Base URL of the upstream REST API.
    #[serde(default = "default_rest_url")]
    pub rest_url: Url,
    /// Host used for the track and listen-along links embedded in cards.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LaudiolinConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            public_url: default_public_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Controls how track metadata is prepared before substitution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenderOptions {
    /// Percent-encode every non-ASCII character of the artist and title.
    #[serde(default)]
    pub escape_non_latin: bool,
    /// Truncate titles longer than this many characters, appending `...`.
    #[serde(default)]
    pub trim_title: Option<usize>,
}

impl RenderOptions {
    pub fn status_default() -> Self { Self { escape_non_latin: false, trim_title: Some(20) } }
}

fn default_port() -> u16 { 3000 }

fn default_assets_dir() -> String { "assets".to_string() }

fn default_true() -> bool { true }

fn default_rest_url() -> Url {
    Url::parse("https://your.laudiolin.rest").expect("valid default URL")
}

fn default_public_url() -> String { "https://laudiolin.seikimo.moe".to_string() }

fn default_timeout_secs() -> u64 { 10 }

impl Config {
    /// Reads `path` if it exists, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let file = BufReader::new(
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
            );
            serde_yaml::from_reader(file)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            tracing::info!("{} not found, using defaults", path.display());
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.normalize();
        Ok(config)
    }

    /// Strips trailing slashes from `public_url` whichever source set it.
    fn normalize(&mut self) {
        let trimmed = self.laudiolin.public_url.trim_end_matches('/').len();
        self.laudiolin.public_url.truncate(trimmed);
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var("PORT") {
            self.server.port = port.parse().with_context(|| format!("Invalid PORT: {port}"))?;
        }
        if let Some(url) = var("LAUDIOLIN_REST_URL") {
            self.laudiolin.rest_url =
                Url::parse(&url).with_context(|| format!("Invalid LAUDIOLIN_REST_URL: {url}"))?;
        }
        if let Some(url) = var("LAUDIOLIN_PUBLIC_URL") {
            self.laudiolin.public_url = url;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.server.legacy_error_status);
        assert_eq!(config.render, RenderOptions::default());
        assert_eq!(config.status.trim_title, Some(20));
        assert!(!config.status.escape_non_latin);
        assert_eq!(Config::default().status, config.status);
    }

    #[test]
    fn test_parse_yaml() {
        let config: Config = serde_yaml::from_str(
            r#"
server:
  port: 8080
laudiolin:
  rest_url: http://localhost:9000
render:
  escape_non_latin: true
  trim_title: 32
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.assets_dir, "assets");
        assert_eq!(config.laudiolin.rest_url.as_str(), "http://localhost:9000/");
        assert_eq!(config.render, RenderOptions { escape_non_latin: true, trim_title: Some(32) });
    }

    #[test]
    fn test_public_url_trailing_slash() {
        let cases: &[(&str, &str)] = &[
            ("https://host/", "https://host"),
            ("https://host//", "https://host"),
            ("https://host/sub/", "https://host/sub"),
            ("https://host", "https://host"),
        ];
        for &(input, expected) in cases {
            let mut config: Config =
                serde_yaml::from_str(&format!("laudiolin:\n  public_url: {input}\n")).unwrap();
            config.normalize();
            assert_eq!(config.laudiolin.public_url, expected, "{input}");
        }

        let path = std::env::temp_dir().join(format!("trackard-config-{}.yml", std::process::id()));
        std::fs::write(&path, "laudiolin:\n  public_url: https://host/\n").unwrap();
        let config = Config::load(&path);
        std::fs::remove_file(&path).unwrap();
        let config = config.unwrap();
        if std::env::var_os("LAUDIOLIN_PUBLIC_URL").is_none() {
            assert_eq!(config.laudiolin.public_url, "https://host");
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(|key| match key {
                "PORT" => Some("4000".to_string()),
                "LAUDIOLIN_PUBLIC_URL" => Some("https://example.com/".to_string()),
                _ => None,
            })
            .unwrap();
        config.normalize();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.laudiolin.public_url, "https://example.com");

        let mut config = Config::default();
        assert!(config.apply_env(|key| (key == "PORT").then(|| "nope".to_string())).is_err());
    }
}
