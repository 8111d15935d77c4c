use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BlogError, Result};
use crate::remote::{API_RETRIES, API_TIMEOUT};

const DEFAULT_CONFIG_FILE: &str = "blog.toml";
const DEFAULT_CONTENT_DIR: &str = "content";
const DEFAULT_PORT: u16 = 8080;
const PRODUCTION_BASE_URL: &str = "https://buyallmemes.com";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub job_title: String,
    pub url: String,
    pub same_as: Vec<String>,
}

impl Default for Author {
    fn default() -> Self {
        Author {
            name: "Mark Fenderov".to_string(),
            job_title: "Staff Engineer".to_string(),
            url: "https://www.linkedin.com/in/mark-fenderov/".to_string(),
            same_as: vec![
                "https://www.linkedin.com/in/mark-fenderov/".to_string(),
                "https://github.com/mfenderov".to_string(),
            ],
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Service {
    pub name: String,
    pub description: String,
}

fn default_services() -> Vec<Service> {
    [
        (
            "Architecture Review",
            "Comprehensive system architecture analysis and recommendations",
        ),
        (
            "Legacy System Migration",
            "Strategic planning and execution of legacy system modernization",
        ),
        (
            "Technical Mentoring",
            "Engineering leadership and technical skill development",
        ),
    ]
    .into_iter()
    .map(|(name, description)| Service {
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}

/// Site identity and runtime settings, read from `blog.toml` and then the environment.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub site_name: String,
    pub description: String,
    /// Public origin without a trailing slash. Derived from the environment when unset.
    pub base_url: Option<String>,
    pub content_dir: PathBuf,
    /// When set, posts are fetched from this endpoint instead of the content directory.
    pub api_url: Option<String>,
    pub api_timeout_secs: u64,
    pub api_retries: u32,
    pub port: u16,
    pub is_development: bool,
    pub twitter_handle: String,
    pub default_image: String,
    pub booking_url: String,
    pub author: Author,
    pub services: Vec<Service>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            site_name: "BuyAllMemes Blog".to_string(),
            description: "Technical blog about software engineering and development patterns"
                .to_string(),
            base_url: None,
            content_dir: PathBuf::from(DEFAULT_CONTENT_DIR),
            api_url: None,
            api_timeout_secs: API_TIMEOUT.as_secs(),
            api_retries: API_RETRIES,
            port: DEFAULT_PORT,
            is_development: false,
            twitter_handle: "@buyallmemes".to_string(),
            default_image: "/static/logo.svg".to_string(),
            booking_url: "https://calendly.com/mfenderov/30min".to_string(),
            author: Author::default(),
            services: default_services(),
        }
    }
}

impl SiteConfig {
    /// Loads `BLOG_CONFIG` (or `blog.toml` when present) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("BLOG_CONFIG").ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if explicit.is_some() || path.exists() {
            Self::from_file(&path)?
        } else {
            SiteConfig::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| BlogError::io(path, e))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(env) = var("RUST_ENV") {
            self.is_development = env == "development";
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(dir) = var("BLOG_CONTENT_DIR") {
            self.content_dir = PathBuf::from(dir);
        }
        if let Some(url) = var("BLOG_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(url) = var("BLOG_API_URL").filter(|u| !u.is_empty()) {
            self.api_url = Some(url);
        }
    }

    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.is_development => format!("http://localhost:{}", self.port),
            None => PRODUCTION_BASE_URL.to_string(),
        }
    }

    /// Absolute URL for a site path or an already absolute URL.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn post_url(&self, slug: &str) -> String {
        format!("{}/blog/{}", self.base_url(), slug)
    }
}
