// src/upload/portal.rs

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::esri::{ApplyEditsResponse, EsriError, EsriFeature};
use crate::config::ServiceConfig;

pub const TOKEN_ENV: &str = "ARCGIS_TOKEN";
pub const PASSWORD_ENV: &str = "ARCGIS_PASSWORD";

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
/// Requested token lifetime, in minutes.
const TOKEN_EXPIRATION: &str = "120";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// The subset of a portal item we need.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ItemInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Decode a REST response body, turning `{"error": {...}}` into an `Err`.
pub fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body).context("response is not JSON")?;
    if let Some(err) = value.get("error") {
        let err: EsriError =
            serde_json::from_value(err.clone()).context("malformed error object in response")?;
        bail!("service error: {}", err);
    }
    serde_json::from_value(value).context("unexpected response shape")
}

/// `<service url>/<layer>` for a feature service item.
pub fn layer_url_for(item: &ItemInfo, layer: u32) -> Result<Url> {
    let service = item
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| anyhow!("item {} has no service url", item.id))?;
    let url = format!("{}/{}", service.trim_end_matches('/'), layer);
    Url::parse(&url).with_context(|| format!("parsing layer URL {}", url))
}

/// A connection to an ArcGIS portal, optionally authenticated.
#[derive(Debug, Clone)]
pub struct Portal {
    client: Client,
    base: String,
    token: Option<String>,
}

impl Portal {
    /// Resolve credentials and build a portal handle.
    ///
    /// Token sources, in order: `service.token`, `$ARCGIS_TOKEN`, then
    /// `generateToken` with `service.username` and `$ARCGIS_PASSWORD`.
    pub async fn connect(client: Client, cfg: &ServiceConfig) -> Result<Self> {
        let base = Url::parse(&cfg.portal_url)
            .with_context(|| format!("parsing portal URL {}", cfg.portal_url))?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let token = match (cfg.token.clone(), env::var(TOKEN_ENV).ok()) {
            (Some(t), _) | (None, Some(t)) if !t.is_empty() => Some(t),
            _ => match &cfg.username {
                Some(user) => {
                    let password = env::var(PASSWORD_ENV).with_context(|| {
                        format!("{} must be set to sign in as {}", PASSWORD_ENV, user)
                    })?;
                    Some(generate_token(&client, &base, user, &password).await?)
                }
                None => {
                    warn!("no credentials configured, using anonymous access");
                    None
                }
            },
        };

        Ok(Self {
            client,
            base,
            token,
        })
    }

    fn with_token<'a>(&'a self, mut params: Vec<(&'a str, String)>) -> Vec<(&'a str, String)> {
        params.push(("f", "json".to_string()));
        if let Some(t) = &self.token {
            params.push(("token", t.clone()));
        }
        params
    }

    /// Look up a portal item, retrying transient failures.
    pub async fn item(&self, item_id: &str) -> Result<ItemInfo> {
        let url = format!("{}/sharing/rest/content/items/{}", self.base, item_id);
        let params = self.with_token(Vec::new());
        let mut attempt = 0;

        let body = loop {
            attempt += 1;
            let resp = self.client.get(&url).query(&params).send().await;
            match resp {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) => break body,
                    Err(e) if attempt < MAX_RETRIES => {
                        warn!(item = %item_id, attempt, "reading item failed: {}, retrying", e);
                        sleep(RETRY_DELAY).await;
                    }
                    Err(e) => return Err(e).with_context(|| format!("reading item {}", item_id)),
                },
                Ok(resp) if resp.status().is_server_error() && attempt < MAX_RETRIES => {
                    warn!(item = %item_id, attempt, status = %resp.status(), "item lookup failed, retrying");
                    sleep(RETRY_DELAY).await;
                }
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(item = %item_id, attempt, "GET {} failed: {}, retrying", url, e);
                    sleep(RETRY_DELAY).await;
                }
                Ok(resp) => bail!("HTTP error {} fetching item {}", resp.status(), item_id),
                Err(e) => return Err(e).with_context(|| format!("GET {}", url)),
            }
        };

        let item: ItemInfo =
            parse_response(&body).with_context(|| format!("looking up item {}", item_id))?;
        debug!(?item, "resolved item");
        Ok(item)
    }

    /// URL of layer `layer` of the feature service behind `item_id`.
    pub async fn layer_url(&self, item_id: &str, layer: u32) -> Result<Url> {
        let item = self.item(item_id).await?;
        let url = layer_url_for(&item, layer)?;
        info!(item = %item_id, title = ?item.title, layer_url = %url, "resolved feature layer");
        Ok(url)
    }

    /// `applyEdits` with adds only.
    pub async fn apply_adds(&self, layer_url: &Url, adds: &[EsriFeature]) -> Result<ApplyEditsResponse> {
        let url = format!("{}/applyEdits", layer_url.as_str().trim_end_matches('/'));
        let payload = serde_json::to_string(adds).context("serializing adds")?;
        let params = self.with_token(vec![("adds", payload)]);

        let body = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?
            .error_for_status()?
            .text()
            .await
            .with_context(|| format!("reading body from {}", url))?;

        parse_response(&body).with_context(|| format!("applyEdits on {}", layer_url))
    }
}

async fn generate_token(client: &Client, base: &str, username: &str, password: &str) -> Result<String> {
    let url = format!("{}/sharing/rest/generateToken", base);
    let params = [
        ("username", username),
        ("password", password),
        ("client", "referer"),
        ("referer", base),
        ("expiration", TOKEN_EXPIRATION),
        ("f", "json"),
    ];
    let body = client
        .post(&url)
        .form(&params)
        .send()
        .await
        .with_context(|| format!("POST {}", url))?
        .error_for_status()?
        .text()
        .await?;
    let resp: TokenResponse =
        parse_response(&body).with_context(|| format!("signing in as {}", username))?;
    info!(user = %username, "signed in to portal");
    Ok(resp.token)
}
