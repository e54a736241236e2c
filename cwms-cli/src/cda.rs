#![doc = "CDA client: bridges the core `Uploader` capability to the CWMS Data API blob endpoints."]
//
//! # CDA Client
//!
//! This module wires the [`Uploader`] trait from `cwms-cli-core` to the real
//! CWMS Data API, and provides the read/delete calls used by the other blob
//! subcommands.
//!
//! - Construct [`CdaClient`] from a [`ConnectionConfig`] (see `load_config`).
//! - [`DryRunUploader`] implements the same trait but only logs what would be sent.
//! - Every call is a single attempt. Timeouts come from the underlying reqwest client.
//!
//! Ids containing characters that cannot live in a path segment are
//! addressed as `blobs/ignored?blob-id=<id>` (or `clobs/ignored?clob-id=<id>`),
//! which the CDA accepts.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cwms_cli_core::contract::{BlobUpload, StoredBlob, UploadError, Uploader};

use crate::load_config::ConnectionConfig;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const UNSAFE_PATH_CHARS: &[char] = &['/', '\\', '?', '#', '%'];

#[derive(Error, Debug)]
pub enum CdaError {
    #[error("CDA returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request to CDA failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid CDA api root {0:?}")]
    InvalidUrl(String),

    #[error("failed to decode CDA response: {0}")]
    Decode(String),
}

/// A blob as returned by `GET blobs/{id}`.
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub content: Vec<u8>,
    /// `Content-Type` of the response, if the server sent one.
    pub media_type: Option<String>,
}

/// One row of `GET blobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSummary {
    #[serde(default)]
    pub office: Option<String>,
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "media-type-id", default)]
    pub media_type_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobList {
    #[serde(default)]
    blobs: Vec<BlobSummary>,
}

#[derive(Debug, Serialize)]
struct BlobPayload<'a> {
    #[serde(rename = "office-id")]
    office_id: &'a str,
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(rename = "media-type-id")]
    media_type_id: &'a str,
    /// Base64 of the file bytes.
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Blob,
    Clob,
}

impl Resource {
    fn collection(self) -> &'static str {
        match self {
            Resource::Blob => "blobs",
            Resource::Clob => "clobs",
        }
    }

    fn id_param(self) -> &'static str {
        match self {
            Resource::Blob => "blob-id",
            Resource::Clob => "clob-id",
        }
    }
}

/// Partial blob for `PATCH blobs/{id}`. `None` fields are sent as null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobPatch {
    pub blob_id: String,
    pub office: String,
    pub description: Option<String>,
    pub media_type: Option<String>,
    pub content: Option<Vec<u8>>,
}

#[derive(Debug, Serialize)]
struct BlobPatchPayload<'a> {
    #[serde(rename = "office-id")]
    office_id: &'a str,
    id: &'a str,
    description: Option<&'a str>,
    #[serde(rename = "media-type-id")]
    media_type_id: Option<&'a str>,
    value: Option<String>,
}

/// A character large object: text stored under an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clob {
    #[serde(
        rename = "office-id",
        alias = "office",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub office: Option<String>,
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClobList {
    #[serde(default)]
    clobs: Vec<Clob>,
}

pub struct CdaClient {
    client: Client,
    api_root: Url,
    api_key: Option<String>,
}

impl CdaClient {
    pub fn new(conn: &ConnectionConfig) -> Result<Self, CdaError> {
        let api_root = normalise_api_root(&conn.api_root)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        tracing::info!(
            api_root = %api_root,
            api_key_set = conn.api_key.is_some(),
            "Initialized CdaClient"
        );
        Ok(CdaClient {
            client,
            api_root,
            api_key: conn.api_key.clone(),
        })
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(AUTHORIZATION, format!("apikey {key}")),
            None => builder,
        }
    }

    /// Fetch the raw content of one blob.
    pub async fn get_blob(&self, blob_id: &str, office: &str) -> Result<FetchedBlob, CdaError> {
        tracing::info!(blob_id, office, "Fetching blob");
        let url = resource_url(&self.api_root, Resource::Blob, blob_id)?;
        let response = self
            .request(Method::GET, url)
            .query(&[("office", office)])
            .send()
            .await?;
        let response = ensure_success(response).await.map_err(|e| {
            tracing::error!(error = %e, blob_id, office, "Failed to fetch blob");
            e
        })?;

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content = response.bytes().await?.to_vec();
        tracing::info!(blob_id, size = content.len(), media_type = ?media_type, "Fetched blob");
        Ok(FetchedBlob {
            content,
            media_type,
        })
    }

    /// List blobs for an office, optionally filtered by a CDA `like` pattern.
    pub async fn list_blobs(
        &self,
        office: &str,
        like: Option<&str>,
    ) -> Result<Vec<BlobSummary>, CdaError> {
        tracing::info!(office, like = like.unwrap_or(""), "Listing blobs");
        let url = endpoint(&self.api_root, "blobs")?;
        let mut request = self
            .request(Method::GET, url)
            .header(ACCEPT, "application/json")
            .query(&[("office", office)]);
        if let Some(like) = like {
            request = request.query(&[("like", like)]);
        }
        let response = ensure_success(request.send().await?).await?;
        let body = response.text().await?;
        let list: BlobList = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = ?e, "Failed to parse blob list");
            CdaError::Decode(e.to_string())
        })?;
        tracing::info!(count = list.blobs.len(), "Fetched blob list");
        Ok(list.blobs)
    }

    pub async fn delete_blob(&self, blob_id: &str, office: &str) -> Result<(), CdaError> {
        tracing::info!(blob_id, office, "Deleting blob");
        let url = resource_url(&self.api_root, Resource::Blob, blob_id)?;
        let response = self
            .request(Method::DELETE, url)
            .query(&[("office", office)])
            .send()
            .await?;
        match ensure_success(response).await {
            Ok(_) => {
                tracing::info!(blob_id, office, "Successfully deleted blob");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, blob_id, office, "Failed to delete blob");
                Err(e)
            }
        }
    }

    /// `PATCH blobs/{id}`. With `ignore_nulls` the CDA keeps fields sent as null.
    pub async fn update_blob(&self, patch: &BlobPatch, ignore_nulls: bool) -> Result<(), CdaError> {
        tracing::info!(blob_id = %patch.blob_id, office = %patch.office, ignore_nulls, "Updating blob");
        let url = resource_url(&self.api_root, Resource::Blob, &patch.blob_id)?;
        let payload = BlobPatchPayload {
            office_id: &patch.office,
            id: &patch.blob_id,
            description: patch.description.as_deref(),
            media_type_id: patch.media_type.as_deref(),
            value: patch.content.as_ref().map(|c| STANDARD.encode(c)),
        };
        let response = self
            .request(Method::PATCH, url)
            .query(&[
                ("office", patch.office.as_str()),
                ("ignore-nulls", if ignore_nulls { "true" } else { "false" }),
            ])
            .json(&payload)
            .send()
            .await?;
        ensure_success(response).await.map_err(|e| {
            tracing::error!(error = %e, blob_id = %patch.blob_id, "Failed to update blob");
            e
        })?;
        Ok(())
    }

    /// `POST clobs`. Returns the view URL of the stored clob.
    pub async fn store_clob(&self, clob: &Clob, overwrite: bool) -> Result<String, CdaError> {
        let office = clob.office.as_deref().unwrap_or_default();
        tracing::info!(clob_id = %clob.id, office, overwrite, "Storing clob");
        let url = endpoint(&self.api_root, "clobs")?;
        let fail_if_exists = (!overwrite).to_string();
        let response = self
            .request(Method::POST, url)
            .query(&[("fail-if-exists", fail_if_exists.as_str())])
            .json(clob)
            .send()
            .await?;
        ensure_success(response).await.map_err(|e| {
            tracing::error!(error = %e, clob_id = %clob.id, "Failed to store clob");
            e
        })?;
        clob_view_url(&self.api_root, &clob.id, office)
    }

    pub async fn get_clob(&self, clob_id: &str, office: &str) -> Result<Clob, CdaError> {
        tracing::info!(clob_id, office, "Fetching clob");
        let url = resource_url(&self.api_root, Resource::Clob, clob_id)?;
        let response = self
            .request(Method::GET, url)
            .header(ACCEPT, "application/json")
            .query(&[("office", office)])
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = ?e, clob_id, "Failed to parse clob");
            CdaError::Decode(e.to_string())
        })
    }

    /// `PATCH clobs/{id}`. Only `description` and `value` that are set are meaningful.
    pub async fn update_clob(&self, clob: &Clob, ignore_nulls: bool) -> Result<(), CdaError> {
        tracing::info!(clob_id = %clob.id, ignore_nulls, "Updating clob");
        let url = resource_url(&self.api_root, Resource::Clob, &clob.id)?;
        let response = self
            .request(Method::PATCH, url)
            .query(&[("ignore-nulls", if ignore_nulls { "true" } else { "false" })])
            .json(clob)
            .send()
            .await?;
        ensure_success(response).await.map_err(|e| {
            tracing::error!(error = %e, clob_id = %clob.id, "Failed to update clob");
            e
        })?;
        Ok(())
    }

    pub async fn delete_clob(&self, clob_id: &str, office: &str) -> Result<(), CdaError> {
        tracing::info!(clob_id, office, "Deleting clob");
        let url = resource_url(&self.api_root, Resource::Clob, clob_id)?;
        let response = self
            .request(Method::DELETE, url)
            .query(&[("office", office)])
            .send()
            .await?;
        ensure_success(response).await.map_err(|e| {
            tracing::error!(error = %e, clob_id, office, "Failed to delete clob");
            e
        })?;
        Ok(())
    }

    pub async fn list_clobs(&self, office: &str, like: Option<&str>) -> Result<Vec<Clob>, CdaError> {
        tracing::info!(office, like = like.unwrap_or(""), "Listing clobs");
        let url = endpoint(&self.api_root, "clobs")?;
        let mut request = self
            .request(Method::GET, url)
            .header(ACCEPT, "application/json")
            .query(&[("office", office)]);
        if let Some(like) = like {
            request = request.query(&[("like", like)]);
        }
        let body = ensure_success(request.send().await?).await?.text().await?;
        let list: ClobList = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = ?e, "Failed to parse clob list");
            CdaError::Decode(e.to_string())
        })?;
        tracing::info!(count = list.clobs.len(), "Fetched clob list");
        Ok(list.clobs)
    }

    async fn store_blob(&self, blob: &BlobUpload) -> Result<StoredBlob, CdaError> {
        let url = endpoint(&self.api_root, "blobs")?;
        let payload = BlobPayload {
            office_id: &blob.office,
            id: &blob.blob_id,
            description: blob.description.as_deref(),
            media_type_id: &blob.media_type,
            value: STANDARD.encode(&blob.content),
        };
        let fail_if_exists = (!blob.overwrite).to_string();
        let response = self
            .request(Method::POST, url)
            .query(&[("fail-if-exists", fail_if_exists.as_str())])
            .json(&payload)
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(StoredBlob {
            blob_id: blob.blob_id.clone(),
            office: blob.office.clone(),
            view_url: view_url(&self.api_root, &blob.blob_id, &blob.office)?,
        })
    }
}

#[async_trait]
impl Uploader for CdaClient {
    async fn upload(&self, blob: &BlobUpload) -> Result<StoredBlob, UploadError> {
        tracing::info!(
            blob_id = %blob.blob_id,
            office = %blob.office,
            media_type = %blob.media_type,
            size = blob.content.len(),
            "Storing blob"
        );
        match self.store_blob(blob).await {
            Ok(stored) => {
                tracing::info!(blob_id = %stored.blob_id, view = %stored.view_url, "Successfully stored blob");
                Ok(stored)
            }
            Err(e) => {
                tracing::error!(error = %e, blob_id = %blob.blob_id, "Failed to store blob");
                Err(Box::new(e))
            }
        }
    }
}

/// Logs the request an upload would make and acknowledges it without touching the network.
pub struct DryRunUploader {
    api_root: Url,
}

impl DryRunUploader {
    pub fn new(api_root: &str) -> Result<Self, CdaError> {
        Ok(DryRunUploader {
            api_root: normalise_api_root(api_root)?,
        })
    }
}

#[async_trait]
impl Uploader for DryRunUploader {
    async fn upload(&self, blob: &BlobUpload) -> Result<StoredBlob, UploadError> {
        let url = endpoint(&self.api_root, "blobs")?;
        let encoded_len = STANDARD.encode(&blob.content).len();
        let summary = serde_json::json!({
            "url": url.as_str(),
            "params": { "fail-if-exists": !blob.overwrite },
            "blob": {
                "office-id": blob.office,
                "id": blob.blob_id,
                "description": blob.description,
                "media-type-id": blob.media_type,
                "value": format!("<base64:{encoded_len} chars>"),
            },
        });
        tracing::info!(url = %url, "--dry-run enabled, would POST blob");
        tracing::info!(payload = %summary, "Blob payload summary");

        Ok(StoredBlob {
            blob_id: blob.blob_id.clone(),
            office: blob.office.clone(),
            view_url: view_url(&self.api_root, &blob.blob_id, &blob.office)?,
        })
    }
}

/// `{root}blobs/{id}?office={office}`, or the `ignored?blob-id=` form for unsafe ids.
pub fn view_url(api_root: &Url, blob_id: &str, office: &str) -> Result<String, CdaError> {
    office_url(api_root, Resource::Blob, blob_id, office)
}

/// Same addressing rule as [`view_url`], under `clobs`.
pub fn clob_view_url(api_root: &Url, clob_id: &str, office: &str) -> Result<String, CdaError> {
    office_url(api_root, Resource::Clob, clob_id, office)
}

pub fn has_unsafe_path_chars(id: &str) -> bool {
    id.contains(UNSAFE_PATH_CHARS)
}

fn office_url(
    api_root: &Url,
    resource: Resource,
    id: &str,
    office: &str,
) -> Result<String, CdaError> {
    let mut url = resource_url(api_root, resource, id)?;
    url.query_pairs_mut().append_pair("office", office);
    Ok(url.to_string())
}

fn normalise_api_root(api_root: &str) -> Result<Url, CdaError> {
    let trimmed = api_root.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|_| CdaError::InvalidUrl(api_root.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(CdaError::InvalidUrl(api_root.to_string()));
    }
    Ok(url)
}

fn endpoint(api_root: &Url, path: &str) -> Result<Url, CdaError> {
    api_root
        .join(path)
        .map_err(|_| CdaError::InvalidUrl(api_root.to_string()))
}

fn resource_url(api_root: &Url, resource: Resource, id: &str) -> Result<Url, CdaError> {
    let mut url = endpoint(api_root, resource.collection())?;
    let segment = if has_unsafe_path_chars(id) {
        url.query_pairs_mut().append_pair(resource.id_param(), id);
        "ignored"
    } else {
        id
    };
    url.path_segments_mut()
        .map_err(|_| CdaError::InvalidUrl(api_root.to_string()))?
        .push(segment);
    Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response, CdaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CdaError::Http { status, body })
}
