//! HTTP client for the project access list endpoints

use super::{AllowlistApi, ApiError};
use crate::config::ApiConfig;
use crate::entry::{AllowlistEntry, EntryKind, EntrySpec};
use crate::error::{AllowlistError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const JSON: &str = "application/json";

/// Request body item for `POST groups/{project_id}/accessList`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessListRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    aws_security_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cidr_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

impl<'a> From<&'a EntrySpec> for AccessListRequest<'a> {
    fn from(spec: &'a EntrySpec) -> Self {
        let mut request = Self {
            aws_security_group: None,
            cidr_block: None,
            ip_address: None,
            comment: spec.comment.as_deref(),
        };
        match &spec.kind {
            EntryKind::CidrBlock(net) => request.cidr_block = Some(net.to_string()),
            EntryKind::IpAddress(ip) => request.ip_address = Some(ip.to_string()),
            EntryKind::AwsSecurityGroup(group) => request.aws_security_group = Some(group.clone()),
        }
        request
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessListEntry {
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    aws_security_group: Option<String>,
    #[serde(default)]
    cidr_block: Option<String>,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

impl From<AccessListEntry> for AllowlistEntry {
    fn from(entry: AccessListEntry) -> Self {
        Self {
            project_id: entry.group_id,
            cidr_block: entry.cidr_block,
            ip_address: entry.ip_address,
            aws_security_group: entry.aws_security_group,
            comment: entry.comment,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessListPage {
    #[serde(default)]
    results: Vec<AccessListEntry>,
}

/// Error payload returned with non-success statuses
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Access list client backed by `reqwest`
#[derive(Debug, Clone)]
pub struct AtlasClient {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl AtlasClient {
    /// Create a client from the API configuration section
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AllowlistError::Config(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = parse_base_url(&config.base_url)?;

        Ok(Self::with_client(client, base_url, config.access_token.clone()))
    }

    /// Create a client with a custom reqwest Client
    pub fn with_client(client: Client, base_url: Url, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            access_token,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn access_list_url(&self, project_id: &str, entry_key: Option<&str>) -> std::result::Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ApiError::from_message(format!("base URL {} cannot be a base", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["groups", project_id, "accessList"]);
            // Pushed as one segment so the `/` of a CIDR block is escaped
            if let Some(key) = entry_key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static(JSON));
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send a request and return the body of a successful response
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&[AccessListRequest<'_>]>,
    ) -> std::result::Result<String, ApiError> {
        debug!(method = %method, url = %url, "Sending allowlist API request");

        let mut req = self.request(method.clone(), url.clone());
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, HeaderValue::from_static(JSON)).json(body);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ApiError::transport(format!("{} {}: {}", method, url, e))
            } else {
                ApiError::from_message(format!("{} {}: {}", method, url, e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("{} {}: failed to read response: {}", method, url, e)))?;

        if status.is_success() {
            debug!(method = %method, url = %url, status = status.as_u16(), "Allowlist API request succeeded");
            return Ok(text);
        }

        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let detail = body
            .detail
            .or(body.reason)
            .unwrap_or_else(|| text.trim().to_string());
        let code = body.error_code;
        let message = format!(
            "{} {}: {} (request {:?}) {}",
            method,
            url,
            status.as_u16(),
            code.as_deref().unwrap_or_default(),
            detail
        );
        debug!(status = status.as_u16(), error_code = ?code, "Allowlist API request failed");

        Err(ApiError::status(status.as_u16(), code, message))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AllowlistError::Config(format!("Invalid base URL {}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(AllowlistError::Config(format!(
            "Base URL {} cannot be used as a base",
            raw
        )));
    }
    Ok(url)
}

fn parse_json<T: for<'de> Deserialize<'de>>(text: &str, what: &str) -> std::result::Result<T, ApiError> {
    serde_json::from_str(text)
        .map_err(|e| ApiError::from_message(format!("failed to parse {}: {}", what, e)))
}

#[async_trait]
impl AllowlistApi for AtlasClient {
    async fn create(
        &self,
        project_id: &str,
        entries: &[EntrySpec],
    ) -> std::result::Result<Vec<AllowlistEntry>, ApiError> {
        let url = self.access_list_url(project_id, None)?;
        let body: Vec<AccessListRequest<'_>> = entries.iter().map(AccessListRequest::from).collect();

        let text = self.send(Method::POST, url, Some(body.as_slice())).await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let page: AccessListPage = parse_json(&text, "access list response")?;
        Ok(page.results.into_iter().map(AllowlistEntry::from).collect())
    }

    async fn get(&self, project_id: &str, entry_key: &str) -> std::result::Result<AllowlistEntry, ApiError> {
        let url = self.access_list_url(project_id, Some(entry_key))?;
        let text = self.send(Method::GET, url, None).await?;
        let entry: AccessListEntry = parse_json(&text, "access list entry")?;
        Ok(entry.into())
    }

    async fn delete(&self, project_id: &str, entry_key: &str) -> std::result::Result<(), ApiError> {
        let url = self.access_list_url(project_id, Some(entry_key))?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}
