//! Thin typed client for the Backblaze B2 native API.
//!
//! Covers the six primitives the gateway needs: account authorization,
//! prefix/delimiter listing, upload-URL acquisition, streamed upload, file
//! info lookup, and version delete. Responses are deserialized into the
//! schemas in `models::b2` at this boundary; callers never see raw JSON.
//!
//! No retry lives here — resilience is the caller's concern via
//! `retry::with_retry`.

use crate::errors::{GatewayError, GatewayResult};
use crate::keys;
use crate::models::b2::{
    B2AuthorizeResponse, B2FileInfo, B2FileList, B2Session, B2UploadTarget,
};
use base64::{Engine as _, engine::general_purpose};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Marker telling the store to accept the upload without hash verification.
const UNVERIFIED_SHA1: &str = "do_not_verify";

/// Custom metadata key carrying the human-facing name, if any.
/// Surfaces in listings as `fileInfo["display-name"]`.
pub const DISPLAY_NAME_HEADER: &str = "X-Bz-Info-display-name";
pub const DISPLAY_NAME_KEY: &str = "display-name";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct B2Client {
    http: reqwest::Client,
    key_id: String,
    application_key: String,
    bucket_id: String,
    auth_base_url: String,
}

impl B2Client {
    /// Build a client with bounded request timeouts.
    ///
    /// Uploads get their own un-timed-out requests (large transfers must not
    /// be cut off mid-stream), so the shared timeout applies to metadata
    /// calls only.
    pub fn new(
        key_id: impl Into<String>,
        application_key: impl Into<String>,
        bucket_id: impl Into<String>,
        auth_base_url: impl Into<String>,
    ) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Store(format!("building http client: {}", err)))?;
        Ok(Self {
            http,
            key_id: key_id.into(),
            application_key: application_key.into(),
            bucket_id: bucket_id.into(),
            auth_base_url: auth_base_url.into(),
        })
    }

    /// Acquire a short-lived session token plus API endpoint bases.
    ///
    /// One outbound call per invocation; the gateway reacquires credentials
    /// for every logical operation rather than caching them.
    pub async fn authorize(&self) -> GatewayResult<B2Session> {
        let basic = general_purpose::STANDARD
            .encode(format!("{}:{}", self.key_id, self.application_key));
        let resp = self
            .http
            .get(format!(
                "{}/b2api/v3/b2_authorize_account",
                self.auth_base_url
            ))
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", basic))
            .send()
            .await
            .map_err(|err| GatewayError::Auth(err.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = body_detail(resp).await;
            return Err(GatewayError::Auth(format!(
                "account endpoint returned {}: {}",
                status, detail
            )));
        }

        let auth: B2AuthorizeResponse = resp
            .json()
            .await
            .map_err(|err| GatewayError::Auth(format!("malformed authorize response: {}", err)))?;
        debug!("authorized against store api {}", auth.api_info.storage_api.api_url);
        Ok(auth.into())
    }

    /// List file names under `prefix`, grouped at `delimiter`, capped at
    /// `max_count` keys. No pagination follow-up is issued; directories
    /// larger than the cap yield a partial view.
    pub async fn list_file_names(
        &self,
        session: &B2Session,
        prefix: &str,
        delimiter: Option<&str>,
        max_count: u32,
    ) -> GatewayResult<B2FileList> {
        let mut body = json!({
            "bucketId": self.bucket_id,
            "prefix": prefix,
            "maxFileCount": max_count,
        });
        if let Some(delim) = delimiter {
            body["delimiter"] = json!(delim);
        }

        let resp = self
            .http
            .post(format!("{}/b2api/v3/b2_list_file_names", session.api_url))
            .header(reqwest::header::AUTHORIZATION, &session.token)
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::Store(format!("list_file_names: {}", err)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = body_detail(resp).await;
            return Err(GatewayError::Store(format!(
                "list_file_names returned {}: {}",
                status, detail
            )));
        }

        resp.json()
            .await
            .map_err(|err| GatewayError::Store(format!("malformed listing response: {}", err)))
    }

    /// Obtain an upload destination (URL + single-use token) for the bucket.
    pub async fn get_upload_url(&self, session: &B2Session) -> GatewayResult<B2UploadTarget> {
        let resp = self
            .http
            .post(format!("{}/b2api/v3/b2_get_upload_url", session.api_url))
            .header(reqwest::header::AUTHORIZATION, &session.token)
            .json(&json!({ "bucketId": self.bucket_id }))
            .send()
            .await
            .map_err(|err| GatewayError::Transfer(format!("get_upload_url: {}", err)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = body_detail(resp).await;
            return Err(GatewayError::Transfer(format!(
                "get_upload_url returned {}: {}",
                status, detail
            )));
        }

        resp.json()
            .await
            .map_err(|err| GatewayError::Transfer(format!("malformed upload target: {}", err)))
    }

    /// Stream `body` to the store under `key`, declaring the length
    /// explicitly and skipping content-hash verification. A display name,
    /// when given, rides along as custom file metadata.
    pub async fn upload_file(
        &self,
        target: &B2UploadTarget,
        key: &str,
        content_length: u64,
        display_name: Option<&str>,
        body: reqwest::Body,
    ) -> GatewayResult<B2FileInfo> {
        let mut req = self
            .http
            .post(&target.upload_url)
            .header(reqwest::header::AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-File-Name", keys::encode_key(key))
            .header("X-Bz-Content-Sha1", UNVERIFIED_SHA1)
            .header(reqwest::header::CONTENT_TYPE, "b2/x-auto")
            .header(reqwest::header::CONTENT_LENGTH, content_length);
        if let Some(name) = display_name {
            req = req.header(DISPLAY_NAME_HEADER, urlencoding::encode(name).into_owned());
        }
        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|err| GatewayError::Transfer(format!("upload: {}", err)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = body_detail(resp).await;
            return Err(GatewayError::Transfer(format!(
                "upload of `{}` returned {}: {}",
                key, status, detail
            )));
        }

        resp.json()
            .await
            .map_err(|err| GatewayError::Transfer(format!("malformed upload response: {}", err)))
    }

    /// Look up metadata for a file id. Missing ids surface as `NotFound`.
    pub async fn get_file_info(
        &self,
        session: &B2Session,
        file_id: &str,
    ) -> GatewayResult<B2FileInfo> {
        let resp = self
            .http
            .post(format!("{}/b2api/v3/b2_get_file_info", session.api_url))
            .header(reqwest::header::AUTHORIZATION, &session.token)
            .json(&json!({ "fileId": file_id }))
            .send()
            .await
            .map_err(|err| GatewayError::Store(format!("get_file_info: {}", err)))?;

        match resp.status() {
            status if status.is_success() => resp
                .json()
                .await
                .map_err(|err| GatewayError::Store(format!("malformed file info: {}", err))),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                Err(GatewayError::NotFound(file_id.to_string()))
            }
            status => {
                let detail = body_detail(resp).await;
                Err(GatewayError::Store(format!(
                    "get_file_info returned {}: {}",
                    status, detail
                )))
            }
        }
    }

    /// Delete one file version. The store requires the id and name pair.
    pub async fn delete_file_version(
        &self,
        session: &B2Session,
        file_id: &str,
        file_name: &str,
    ) -> GatewayResult<()> {
        let resp = self
            .http
            .post(format!(
                "{}/b2api/v3/b2_delete_file_version",
                session.api_url
            ))
            .header(reqwest::header::AUTHORIZATION, &session.token)
            .json(&json!({ "fileId": file_id, "fileName": file_name }))
            .send()
            .await
            .map_err(|err| GatewayError::Store(format!("delete_file_version: {}", err)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = body_detail(resp).await;
            return Err(GatewayError::Store(format!(
                "delete of `{}` returned {}: {}",
                file_name, status, detail
            )));
        }
        Ok(())
    }
}

/// Best-effort extraction of the store's error message from a failed response.
async fn body_detail(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(text) if !text.is_empty() => {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or(text),
                Err(_) => text,
            }
        }
        _ => "<no body>".to_string(),
    }
}
