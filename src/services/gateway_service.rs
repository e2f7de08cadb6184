//! src/services/gateway_service.rs
//!
//! GatewayService — presents the flat bucket namespace as a one-level-at-a-
//! time directory tree. This file owns the listing translation, the remote
//! ingest pipeline with its scratch-area discipline, and the folder
//! lifecycle built on placeholder objects. All store I/O goes through
//! `B2Client`; credentials are reacquired per logical operation.

use crate::config::AppConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::keys;
use crate::models::b2::{B2FileInfo, B2FileList, B2Session};
use crate::models::entry::{DirectoryListing, FileEntry, IngestReceipt};
use crate::retry::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, with_retry};
use crate::services::b2_client::{B2Client, DISPLAY_NAME_KEY};
use futures::{StreamExt, future::join_all};
use std::{collections::BTreeSet, path::{Path, PathBuf}, time::Duration};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

/// Maximum keys requested per listing call. The store may truncate larger
/// directories; no continuation request is issued.
const MAX_LIST_KEYS: u32 = 10_000;

/// Zero-byte leaf uploaded to make an empty folder prefix enumerable.
const PLACEHOLDER_LEAF: &str = ".keep";

/// Marker leaves filtered out of listings. `.bzEmpty` is the legacy marker
/// some buckets still carry from web-UI folder creation.
const PLACEHOLDER_MARKERS: [&str; 2] = [".keep", ".bzEmpty"];

/// Leaf used when a remote URL has no usable final path segment.
const FALLBACK_LEAF: &str = "download";

const FETCH_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle bound on the ingest fetch: reading must make progress within this
/// window or the transfer fails. Bounds time-to-headers and stalled reads
/// without capping the total duration of a large download.
const FETCH_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// GatewayService provides the five gateway operations:
/// - List a virtual directory (child folders + direct files)
/// - Ingest a remote URL into the bucket
/// - Create a virtual folder (placeholder upload)
/// - Delete a single file by id + key
/// - Delete a folder and everything under it
#[derive(Clone)]
pub struct GatewayService {
    client: B2Client,
    /// Client used for remote ingest fetches; connect- and read-inactivity
    /// bounded, with no total-duration cap so large downloads can finish.
    fetch: reqwest::Client,
    bucket_name: String,
    public_base_url: String,
    scratch_dir: PathBuf,
}

impl GatewayService {
    pub fn new(cfg: &AppConfig) -> GatewayResult<Self> {
        let client = B2Client::new(
            &cfg.key_id,
            &cfg.application_key,
            &cfg.bucket_id,
            &cfg.auth_base_url,
        )?;
        let fetch = reqwest::Client::builder()
            .connect_timeout(FETCH_CONNECT_TIMEOUT)
            .read_timeout(FETCH_READ_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Store(format!("building fetch client: {}", err)))?;
        Ok(Self {
            client,
            fetch,
            bucket_name: cfg.bucket_name.clone(),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
            scratch_dir: PathBuf::from(&cfg.scratch_dir),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// List the immediate children of a virtual directory.
    ///
    /// Authorization + listing run together under the retry envelope, then
    /// the flat response is translated into folders and files. Idempotent
    /// for unchanged store state.
    pub async fn list(&self, path: &str) -> GatewayResult<DirectoryListing> {
        let folder_key = keys::normalize_folder_path(path);
        let prefix = if folder_key.is_empty() {
            String::new()
        } else {
            format!("{}/", folder_key)
        };

        let (_, listing) = with_retry(
            || self.list_prefix(&prefix, Some("/")),
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_INITIAL_DELAY,
        )
        .await?;

        Ok(translate_listing(&prefix, listing))
    }

    /// Fetch a remote resource and persist it under a canonical key.
    ///
    /// The bytes are held in a per-invocation scratch directory which is
    /// removed on every exit path. No retry wraps the fetch-and-upload
    /// sequence; a retried transfer could duplicate a partial upload.
    pub async fn ingest(
        &self,
        url: &str,
        folder: &str,
        desired_name: Option<&str>,
        display_name: Option<&str>,
    ) -> GatewayResult<IngestReceipt> {
        let leaf_raw = match desired_name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => leaf_from_url(url),
        };
        let leaf = keys::normalize_file_name(&leaf_raw);
        let folder_key = keys::normalize_folder_path(folder);
        let key = keys::join_key(&folder_key, &leaf);

        // Per-invocation scratch directory; the leaf keeps concurrent
        // ingests of different files distinguishable on disk.
        let scratch = self.scratch_dir.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&scratch).await?;
        let scratch_file = scratch.join(&leaf);

        let outcome = self
            .fetch_then_upload(url, &key, display_name, &scratch_file)
            .await;

        if let Err(err) = fs::remove_dir_all(&scratch).await {
            debug!("failed to remove scratch dir {}: {}", scratch.display(), err);
        }

        let (info, size_bytes) = outcome?;
        Ok(IngestReceipt {
            file_id: info.file_id,
            public_url: self.public_url(&key),
            key,
            size_bytes,
            display_name: display_name.map(str::to_string),
        })
    }

    /// Create a virtual folder by uploading its placeholder object.
    ///
    /// Re-creating an existing folder overwrites the placeholder, which is
    /// a harmless no-op in effect.
    pub async fn create_folder(&self, path: &str) -> GatewayResult<String> {
        let folder_key = keys::normalize_folder_path(path);
        let marker_key = format!("{}/{}", folder_key, PLACEHOLDER_LEAF);

        let session = self.client.authorize().await?;
        let target = self.client.get_upload_url(&session).await?;
        self.client
            .upload_file(&target, &marker_key, 0, None, reqwest::Body::from(""))
            .await?;

        debug!("created folder `{}` via {}", folder_key, marker_key);
        Ok(folder_key)
    }

    /// Delete a folder and every object beneath its prefix.
    ///
    /// Deletions fan out concurrently; failures are collected and reported
    /// by key so callers can retry just the failed subset.
    pub async fn delete_folder(&self, path: &str) -> GatewayResult<()> {
        let folder_key = keys::normalize_folder_path(path);
        let prefix = format!("{}/", folder_key);

        // Deep listing: no delimiter, markers included.
        let (session, listing) = with_retry(
            || self.list_prefix(&prefix, None),
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_INITIAL_DELAY,
        )
        .await?;

        if listing.files.is_empty() {
            return Ok(());
        }

        let deletions = listing.files.iter().map(|file| {
            let session = &session;
            async move {
                self.client
                    .delete_file_version(session, &file.file_id, &file.file_name)
                    .await
                    .map_err(|err| {
                        debug!("delete of `{}` failed: {}", file.file_name, err);
                        file.file_name.clone()
                    })
            }
        });

        let failed: Vec<String> = join_all(deletions)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::PartialDelete { failed })
        }
    }

    /// Delete one file, verifying it exists first.
    ///
    /// The id and key pair is required by the store for version-safe
    /// deletion; a failed lookup surfaces as `NotFound` before any delete
    /// is attempted.
    pub async fn delete_file(&self, file_id: &str, key: &str) -> GatewayResult<()> {
        let session = self.client.authorize().await?;
        self.client.get_file_info(&session, file_id).await?;
        self.client
            .delete_file_version(&session, file_id, key)
            .await
    }

    /// Public download URL for a canonical key.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url,
            self.bucket_name,
            keys::encode_key(key)
        )
    }

    /// One authorize + list round trip, shaped for the retry envelope.
    async fn list_prefix(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> GatewayResult<(B2Session, B2FileList)> {
        let session = self.client.authorize().await?;
        let listing = self
            .client
            .list_file_names(&session, prefix, delimiter, MAX_LIST_KEYS)
            .await?;
        Ok((session, listing))
    }

    /// Fetch `url` into `scratch_file`, then stream it to the store under
    /// `key`. The caller removes the scratch directory afterwards.
    async fn fetch_then_upload(
        &self,
        url: &str,
        key: &str,
        display_name: Option<&str>,
        scratch_file: &Path,
    ) -> GatewayResult<(B2FileInfo, i64)> {
        let resp = self
            .fetch
            .get(url)
            .send()
            .await
            .map_err(|err| GatewayError::Fetch {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                detail: err.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(GatewayError::Fetch {
                status: resp.status().as_u16(),
                detail: format!("GET {}", url),
            });
        }

        let mut file = fs::File::create(scratch_file).await?;
        let mut stream = resp.bytes_stream();
        let mut size_bytes: i64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| GatewayError::Fetch {
                status: 0,
                detail: format!("body stream interrupted: {}", err),
            })?;
            size_bytes += chunk.len() as i64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let session = self.client.authorize().await?;
        let target = self.client.get_upload_url(&session).await?;

        let reader = fs::File::open(scratch_file).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(reader));
        let info = self
            .client
            .upload_file(&target, key, size_bytes as u64, display_name, body)
            .await?;

        Ok((info, size_bytes))
    }
}

/// Translate one delimiter-scoped listing into a directory view.
///
/// Direct files keep their leaf name; deeper keys contribute their first
/// segment as a child folder. Placeholder markers never surface. Folders
/// come back sorted by the BTreeSet, files are sorted by name.
fn translate_listing(prefix: &str, listing: B2FileList) -> DirectoryListing {
    let mut folders = BTreeSet::new();
    let mut files = Vec::new();

    for file in listing.files {
        let Some(rest) = file.file_name.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            None => {
                if PLACEHOLDER_MARKERS.contains(&rest) {
                    continue;
                }
                let display_name = file.file_info.get(DISPLAY_NAME_KEY).map(|value| {
                    urlencoding::decode(value)
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| value.clone())
                });
                files.push(FileEntry {
                    name: rest.to_string(),
                    display_name,
                    size_bytes: file.content_length,
                    uploaded_at: file.uploaded_at(),
                    file_id: file.file_id,
                    key: file.file_name,
                });
            }
            Some((first, _)) => {
                if !first.is_empty() {
                    folders.insert(first.to_string());
                }
            }
        }
    }

    for common in listing.common_prefixes {
        if let Some(name) = common
            .trim_end_matches('/')
            .rsplit('/')
            .find(|segment| !segment.is_empty())
        {
            folders.insert(name.to_string());
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));

    DirectoryListing {
        folders: folders.into_iter().collect(),
        files,
    }
}

/// Derive a leaf name from a URL's final path segment.
///
/// Query and fragment are stripped first, the segment percent-decoded.
/// URLs ending in `/` (or nothing usable) fall back to a generic leaf.
fn leaf_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let segment = without_query.rsplit('/').next().unwrap_or("");

    let decoded = urlencoding::decode(segment)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    if decoded.trim().is_empty() {
        FALLBACK_LEAF.to_string()
    } else {
        decoded
    }
}
