//! Typed wire schemas for the Backblaze B2 native API.
//!
//! Each store call deserializes into one of these at the boundary so the
//! rest of the gateway operates on validated structures instead of
//! loosely-shaped payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// `b2_authorize_account` response body (v3 shape).
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct B2AuthorizeResponse {
    pub authorization_token: String,
    pub api_info: B2ApiInfo,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct B2ApiInfo {
    pub storage_api: B2StorageApi,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct B2StorageApi {
    pub api_url: String,
    pub download_url: String,
}

/// Short-lived credential plus endpoint bases, re-acquired per operation.
#[derive(Clone, Debug)]
pub struct B2Session {
    pub token: String,
    pub api_url: String,
    pub download_url: String,
}

impl From<B2AuthorizeResponse> for B2Session {
    fn from(resp: B2AuthorizeResponse) -> Self {
        Self {
            token: resp.authorization_token,
            api_url: resp.api_info.storage_api.api_url,
            download_url: resp.api_info.storage_api.download_url,
        }
    }
}

/// A single file record as returned by listing, upload, and info calls.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct B2FileInfo {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub content_length: i64,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub upload_timestamp: i64,
    /// Custom metadata set at upload time via `X-Bz-Info-*` headers.
    #[serde(default)]
    pub file_info: HashMap<String, String>,
}

impl B2FileInfo {
    /// Upload instant decoded from the store's millisecond epoch.
    pub fn uploaded_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.upload_timestamp).unwrap_or_default()
    }
}

/// `b2_list_file_names` response body.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct B2FileList {
    pub files: Vec<B2FileInfo>,
    /// Folder-level prefixes one delimiter deeper, when the store reports them.
    #[serde(default)]
    pub common_prefixes: Vec<String>,
}

/// `b2_get_upload_url` response body: where to send bytes, and with what token.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct B2UploadTarget {
    pub upload_url: String,
    pub authorization_token: String,
}
