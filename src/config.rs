use std::time::Duration;

use reqwest::Url;

use crate::constants::{DEFAULT_TIMEOUT, GOURMET_BASE_URL, VENTOPAY_BASE_URL};
use crate::errors::{ClientError, Result};

/// Where a site lives and how long a single request may take.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl SiteConfig {
    pub fn gourmet() -> Self {
        SiteConfig {
            base_url: GOURMET_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn ventopay() -> Self {
        SiteConfig {
            base_url: VENTOPAY_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `scheme://host[:port]` of the base url, sent as `Origin` on every POST.
    pub fn origin(&self) -> Result<String> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        Ok(url.origin().ascii_serialization())
    }

    /// Absolute url for a site path like `/start/`.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path_of_base_url() {
        assert_eq!(
            SiteConfig::ventopay().origin().unwrap(),
            "https://my.ventopay.com"
        );
        assert_eq!(
            SiteConfig::gourmet().origin().unwrap(),
            "https://alaclickneu.gourmet.at"
        );
    }

    #[test]
    fn url_joins_relative_paths() {
        let cfg = SiteConfig::ventopay();
        assert_eq!(
            cfg.url("/Login.aspx"),
            "https://my.ventopay.com/mocca.website/Login.aspx"
        );
        assert_eq!(
            cfg.url("Login.aspx"),
            "https://my.ventopay.com/mocca.website/Login.aspx"
        );

        let local = SiteConfig::gourmet().with_base_url("http://127.0.0.1:4000/");
        assert_eq!(local.url("/start/"), "http://127.0.0.1:4000/start/");
        assert_eq!(local.origin().unwrap(), "http://127.0.0.1:4000");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let cfg = SiteConfig::gourmet().with_base_url("not a url");
        assert!(matches!(cfg.origin(), Err(ClientError::InvalidUrl(_))));
    }
}
