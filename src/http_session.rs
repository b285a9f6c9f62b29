use std::time::Instant;

use reqwest::header::{ORIGIN, REFERER};
use reqwest::{multipart, redirect, Client};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::SiteConfig;
use crate::errors::{ClientError, Result};

/// How a site expects its HTML forms to be posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEncoding {
    Multipart,
    UrlEncoded,
}

/// Cookie-keeping transport for one site, one per api instance.
///
/// Never sets a User-Agent and never throttles; both portals fingerprint
/// headers and request timing. Retries are left to the caller.
pub struct HttpSession {
    client: Client,
    config: SiteConfig,
    origin: String,
    encoding: FormEncoding,
    /// url of the last page fetched with `get`, sent as `Referer` on POSTs
    last_page_url: Option<String>,
}

fn build_client(config: &SiteConfig) -> Result<Client> {
    Ok(Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::limited(5))
        .timeout(config.timeout)
        .build()?)
}

impl HttpSession {
    pub fn new(config: SiteConfig, encoding: FormEncoding) -> Result<Self> {
        let origin = config.origin()?;
        let client = build_client(&config)?;

        Ok(HttpSession {
            client,
            config,
            origin,
            encoding,
            last_page_url: None,
        })
    }

    pub async fn get(&mut self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let url = self.config.url(path);
        let mut req = self.client.get(&url);
        if !params.is_empty() {
            req = req.query(params);
        }

        let now = Instant::now();
        let resp = req.send().await?.error_for_status()?;
        log::debug!("GET {} -> {} ({:.2?})", path, resp.status(), now.elapsed());

        self.last_page_url = Some(resp.url().to_string());
        Ok(resp.text().await?)
    }

    /// Posts an HTML form, preserving field order.
    pub async fn post_form(&mut self, path: &str, fields: &[(String, String)]) -> Result<String> {
        let url = self.config.url(path);
        let referer = self.last_page_url.clone().unwrap_or_else(|| url.clone());

        let req = self
            .client
            .post(&url)
            .header(ORIGIN, &self.origin)
            .header(REFERER, referer);
        let req = match self.encoding {
            FormEncoding::Multipart => {
                let form = fields.iter().fold(multipart::Form::new(), |form, (name, value)| {
                    form.text(name.clone(), value.clone())
                });
                req.multipart(form)
            }
            FormEncoding::UrlEncoded => req.form(fields),
        };

        let now = Instant::now();
        let resp = req.send().await?.error_for_status()?;
        log::debug!("POST {} -> {} ({:.2?})", path, resp.status(), now.elapsed());

        Ok(resp.text().await?)
    }

    pub async fn post_json<B, R>(&mut self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.config.url(path);
        let referer = self.last_page_url.clone().unwrap_or_else(|| url.clone());

        let now = Instant::now();
        let resp = self
            .client
            .post(&url)
            .header(ORIGIN, &self.origin)
            .header(REFERER, referer)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        log::debug!("POST {} -> {} ({:.2?})", path, resp.status(), now.elapsed());

        let text = resp.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::parse(format!("unexpected JSON from {}: {}", path, e)))
    }

    /// Drops every cookie and the remembered referer.
    pub fn reset(&mut self) -> Result<()> {
        self.client = build_client(&self.config)?;
        self.last_page_url = None;
        Ok(())
    }
}
