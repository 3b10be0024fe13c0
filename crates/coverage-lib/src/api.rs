//! Monitoring-platform API collaborator
//!
//! The core consumes the platform through the [`TelemetryApi`] trait so the
//! collectors and the aggregator can be exercised against an in-memory
//! fake. [`HttpTelemetryApi`] is the production implementation: bearer-token
//! auth, sub-account scoping via the `Account-Name` header, and pagination
//! by following `paging.urls.nextPage` until the server stops returning one.

use crate::models::TimeWindow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// One predicate in an inventory search request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchFilter {
    pub field: String,
    pub expression: String,
    pub value: String,
}

impl SearchFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expression: "eq".to_string(),
            value: value.into(),
        }
    }
}

/// Raw inventory record as returned by the search API. The nested
/// `resourceConfig` shape is provider-specific and stays untyped until the
/// normalizer scrapes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryRecord {
    #[serde(default)]
    pub urn: Option<String>,
    #[serde(rename = "resourceConfig", default)]
    pub resource_config: serde_json::Value,
    #[serde(rename = "resourceTags", default)]
    pub resource_tags: Option<serde_json::Value>,
}

/// Raw agent heartbeat record. The `tags` map carries provider, account,
/// hostname and instance id when the agent knows them; `hostname` is the
/// top-level fallback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentRecord {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
}

impl AgentRecord {
    /// String-valued tag lookup.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref()?.get(key)?.as_str()
    }
}

/// Collaborator contract consumed by the collectors and the aggregator.
///
/// Implementations return fully drained result sets (all pages) and are
/// responsible for per-request time bounds. Retries, if any, belong here
/// too; the core performs none.
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// Search resource inventory for one sub-account over a time window.
    async fn inventory_search(
        &self,
        account: &str,
        csp: &str,
        filters: &[SearchFilter],
        window: &TimeWindow,
    ) -> Result<Vec<InventoryRecord>>;

    /// Search agent heartbeat records for one sub-account over a time window.
    async fn agent_telemetry_search(
        &self,
        account: &str,
        window: &TimeWindow,
    ) -> Result<Vec<AgentRecord>>;

    /// Sub-account labels the caller is authorized to inspect.
    async fn identity_profile(&self) -> Result<Vec<String>>;
}

// Wire shapes for the HTTP implementation.

#[derive(Debug, Serialize)]
struct TimeFilter {
    #[serde(rename = "startTime")]
    start_time: String,
    #[serde(rename = "endTime")]
    end_time: String,
}

#[derive(Debug, Serialize)]
struct InventorySearchRequest<'a> {
    #[serde(rename = "timeFilter")]
    time_filter: TimeFilter,
    filters: &'a [SearchFilter],
    csp: &'a str,
}

#[derive(Debug, Serialize)]
struct AgentSearchRequest {
    #[serde(rename = "timeFilter")]
    time_filter: TimeFilter,
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    urls: PagingUrls,
}

#[derive(Debug, Default, Deserialize)]
struct PagingUrls {
    #[serde(rename = "nextPage", default)]
    next_page: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "keyId")]
    key_id: &'a str,
    #[serde(rename = "expiryTime")]
    expiry_time: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(rename = "expiresAt", default)]
    expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserProfileResponse {
    #[serde(default = "Vec::new")]
    data: Vec<UserProfileEntry>,
}

#[derive(Debug, Deserialize)]
struct UserProfileEntry {
    #[serde(default = "Vec::new")]
    accounts: Vec<UserProfileAccount>,
}

#[derive(Debug, Deserialize)]
struct UserProfileAccount {
    #[serde(rename = "accountName", default)]
    account_name: String,
}

struct BearerToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// HTTP client for the monitoring platform's v2 API.
pub struct HttpTelemetryApi {
    client: Client,
    base_url: Url,
    api_key: String,
    api_secret: String,
    token: RwLock<Option<BearerToken>>,
}

const TOKEN_LIFETIME_SECS: u64 = 3600;
const REQUEST_TIMEOUT_SECS: u64 = 120;

impl HttpTelemetryApi {
    /// Create a client for the given tenant. `account` may be a bare tenant
    /// name (`mytenant`, expanded to `https://mytenant.lacework.net`) or a
    /// full base URL.
    pub fn new(account: &str, api_key: &str, api_secret: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        let base = if account.starts_with("http://") || account.starts_with("https://") {
            account.to_string()
        } else if account.contains('.') {
            format!("https://{}", account)
        } else {
            format!("https://{}.lacework.net", account)
        };
        let base_url = Url::parse(&base).with_context(|| format!("Invalid tenant URL: {}", base))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            token: RwLock::new(None),
        })
    }

    /// Exchange the key/secret pair for a bearer token, reusing a cached
    /// token while it has more than a minute of life left.
    async fn bearer_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(t) = token.as_ref() {
                if t.expires_at > Utc::now() + Duration::seconds(60) {
                    return Ok(t.token.clone());
                }
            }
        }

        let url = self.base_url.join("api/v2/access/tokens")?;
        let response = self
            .client
            .post(url)
            .header("X-LW-UAKS", &self.api_secret)
            .json(&TokenRequest {
                key_id: &self.api_key,
                expiry_time: TOKEN_LIFETIME_SECS,
            })
            .send()
            .await
            .context("Token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token request rejected ({}): {}", status, body);
        }

        let parsed: TokenResponse = response.json().await.context("Failed to parse token response")?;
        let expires_at = parsed
            .expires_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(TOKEN_LIFETIME_SECS as i64));

        let mut token = self.token.write().await;
        *token = Some(BearerToken {
            token: parsed.token.clone(),
            expires_at,
        });

        Ok(parsed.token)
    }

    /// POST a search request and drain every page. The server signals the
    /// end of the result set by omitting `paging.urls.nextPage`; follow-up
    /// pages are plain GETs against that URL.
    async fn search_all_pages<T, B>(&self, path: &str, account: &str, body: &B) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.bearer_token().await?;
        let url = self.base_url.join(path).context("Invalid search path")?;

        let mut records: Vec<T> = Vec::new();
        let mut pages = 0usize;

        let mut request = self
            .client
            .post(url)
            .bearer_auth(&token)
            .header("Account-Name", account)
            .json(body);

        loop {
            let response = request.send().await.context("Search request failed")?;
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                anyhow::bail!("Search rejected ({}): {}", status, text);
            }

            let page: SearchPage<T> = response.json().await.context("Failed to parse search page")?;
            pages += 1;
            records.extend(page.data);

            let next = page.paging.and_then(|p| p.urls.next_page);
            match next {
                Some(next_url) => {
                    let next_url =
                        Url::parse(&next_url).context("Invalid nextPage URL in search response")?;
                    request = self
                        .client
                        .get(next_url)
                        .bearer_auth(&token)
                        .header("Account-Name", account);
                }
                None => break,
            }
        }

        debug!(path, account, pages, records = records.len(), "Search drained");
        Ok(records)
    }
}

#[async_trait]
impl TelemetryApi for HttpTelemetryApi {
    async fn inventory_search(
        &self,
        account: &str,
        csp: &str,
        filters: &[SearchFilter],
        window: &TimeWindow,
    ) -> Result<Vec<InventoryRecord>> {
        let body = InventorySearchRequest {
            time_filter: TimeFilter {
                start_time: window.start_str(),
                end_time: window.end_str(),
            },
            filters,
            csp,
        };
        self.search_all_pages("api/v2/Inventory/search", account, &body)
            .await
    }

    async fn agent_telemetry_search(
        &self,
        account: &str,
        window: &TimeWindow,
    ) -> Result<Vec<AgentRecord>> {
        let body = AgentSearchRequest {
            time_filter: TimeFilter {
                start_time: window.start_str(),
                end_time: window.end_str(),
            },
        };
        self.search_all_pages("api/v2/AgentInfo/search", account, &body)
            .await
    }

    async fn identity_profile(&self) -> Result<Vec<String>> {
        let token = self.bearer_token().await?;
        let url = self.base_url.join("api/v2/UserProfile")?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .context("User profile request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("User profile rejected ({}): {}", status, body);
        }

        let profile: UserProfileResponse = response
            .json()
            .await
            .context("Failed to parse user profile")?;

        Ok(profile
            .data
            .into_iter()
            .flat_map(|entry| entry.accounts)
            .map(|a| a.account_name)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn token_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/api/v2/access/tokens")
            .with_status(200)
            .with_body(
                json!({"token": "test-token", "expiresAt": "2099-01-01T00:00:00Z"}).to_string(),
            )
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_inventory_search_follows_next_page() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;

        let next_url = format!("{}/api/v2/Inventory/search?page=2", server.url());
        let _page1 = server
            .mock("POST", "/api/v2/Inventory/search")
            .match_header("Account-Name", "sub-a")
            .match_header("Authorization", "Bearer test-token")
            .with_status(200)
            .with_body(
                json!({
                    "data": [{"urn": "arn:1", "resourceConfig": {"InstanceId": "i-1"}}],
                    "paging": {"urls": {"nextPage": next_url}}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _page2 = server
            .mock("GET", "/api/v2/Inventory/search?page=2")
            .with_status(200)
            .with_body(
                json!({
                    "data": [{"urn": "arn:2", "resourceConfig": {"InstanceId": "i-2"}}],
                    "paging": {"urls": {}}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = HttpTelemetryApi::new(&server.url(), "key", "secret").unwrap();
        let window = TimeWindow::lookback_days(1);
        let records = api
            .inventory_search("sub-a", "AWS", &[SearchFilter::eq("resourceType", "ec2:instance")], &window)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].resource_config["InstanceId"], "i-1");
        assert_eq!(records[1].resource_config["InstanceId"], "i-2");
    }

    #[tokio::test]
    async fn test_search_error_status_bails() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let _search = server
            .mock("POST", "/api/v2/AgentInfo/search")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let api = HttpTelemetryApi::new(&server.url(), "key", "secret").unwrap();
        let window = TimeWindow::lookback_days(1);
        let err = api.agent_telemetry_search("sub-a", &window).await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_identity_profile_collects_account_names() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let _profile = server
            .mock("GET", "/api/v2/UserProfile")
            .with_status(200)
            .with_body(
                json!({
                    "data": [{"accounts": [
                        {"accountName": "sub-a"},
                        {"accountName": "sub-b"}
                    ]}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = HttpTelemetryApi::new(&server.url(), "key", "secret").unwrap();
        let accounts = api.identity_profile().await.unwrap();
        assert_eq!(accounts, vec!["sub-a", "sub-b"]);
    }

    #[test]
    fn test_tenant_url_expansion() {
        let api = HttpTelemetryApi::new("mytenant", "k", "s").unwrap();
        assert_eq!(api.base_url.as_str(), "https://mytenant.lacework.net/");

        let api = HttpTelemetryApi::new("tenant.example.com", "k", "s").unwrap();
        assert_eq!(api.base_url.host_str(), Some("tenant.example.com"));
    }
}
