//! Page loading from URLs, files, and stdin.
//!
//! The controller's web-page precondition lives here too: only http(s)
//! sources are eligible for analysis triggering; files and stdin carry no
//! URL and are exempt.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::{MarginaliaError, Result};

/// HTTP settings for fetching the article page.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// User-Agent string sent with page fetches.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (compatible; Marginalia/1.0; +https://github.com/stormlightlabs/marginalia)"
                .to_string(),
        }
    }
}

/// Where the article page comes from.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// Fetched over HTTP(S).
    Web(Url),
    /// Read from a local file.
    File(PathBuf),
    /// Read from standard input (`-`).
    Stdin,
}

impl PageSource {
    /// Classifies a CLI input string.
    ///
    /// `-` means stdin; anything with an `http://` or `https://` prefix is
    /// parsed as a URL; everything else is a file path. Non-web URL schemes
    /// are rejected up front, mirroring the trigger precondition.
    pub fn parse(input: &str) -> Result<Self> {
        if input == "-" {
            return Ok(Self::Stdin);
        }

        if input.starts_with("http://") || input.starts_with("https://") {
            let url = Url::parse(input).map_err(|e| MarginaliaError::InvalidUrl(e.to_string()))?;
            return Ok(Self::Web(url));
        }

        if input.contains("://") {
            return Err(MarginaliaError::UnsupportedPage(input.to_string()));
        }

        Ok(Self::File(PathBuf::from(input)))
    }

    /// The source URL, for web sources.
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Web(url) => Some(url),
            _ => None,
        }
    }

    /// Loads the page HTML.
    pub async fn load(&self, config: &FetchConfig) -> Result<String> {
        match self {
            Self::Web(url) => fetch_url(url, config).await,
            Self::File(path) => {
                if !path.exists() {
                    return Err(MarginaliaError::FileNotFound(path.clone()));
                }
                Ok(fs::read_to_string(path)?)
            }
            Self::Stdin => {
                use std::io::Read;
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

async fn fetch_url(url: &Url, config: &FetchConfig) -> Result<String> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(MarginaliaError::HttpError)?;

    let response = client
        .get(url.clone())
        .header("User-Agent", &config.user_agent)
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                MarginaliaError::Timeout { timeout: config.timeout }
            } else {
                MarginaliaError::HttpError(e)
            }
        })?;

    Ok(response.text().await?)
}
