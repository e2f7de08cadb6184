//! Canonical key normalization.
//!
//! User-supplied names and paths are lowered into the restricted alphabet the
//! bucket actually stores: lowercase alphanumerics plus `.` for file leaves
//! and `/` for folder paths, everything else replaced with `-` and hyphen
//! runs collapsed. Pure and total — normalization never fails, although an
//! input made entirely of disallowed characters degenerates to `"-"`.

/// Normalize a single file leaf name into a storage-safe key segment.
///
/// Keeps `[a-z0-9.]`, maps the rest to `-`, collapses consecutive hyphens.
pub fn normalize_file_name(raw: &str) -> String {
    sanitize(raw, |c| matches!(c, 'a'..='z' | '0'..='9' | '.'))
}

/// Normalize a folder path into a storage-safe key prefix.
///
/// Keeps `[a-z0-9/]`, maps the rest to `-`, collapses consecutive hyphens
/// and consecutive delimiters, then strips leading/trailing delimiters so
/// the result never starts or ends with `/` and never contains an empty
/// segment. An empty or root path normalizes to the empty string.
pub fn normalize_folder_path(raw: &str) -> String {
    let cleaned = sanitize(raw, |c| matches!(c, 'a'..='z' | '0'..='9' | '/'));
    let mut out = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c != '/' || !out.ends_with('/') {
            out.push(c);
        }
    }
    out.trim_matches('/').to_string()
}

/// Join a canonical folder key and a canonical leaf into a full object key.
///
/// The folder key may be empty (root), in which case the leaf stands alone.
pub fn join_key(folder_key: &str, leaf: &str) -> String {
    if folder_key.is_empty() {
        leaf.to_string()
    } else {
        format!("{}/{}", folder_key, leaf)
    }
}

/// Percent-encode a canonical key for use in URLs and wire headers.
///
/// Segments are encoded individually so the `/` delimiters survive intact.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lowercase, map characters outside `keep` to `-`, collapse hyphen runs.
fn sanitize(raw: &str, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        if keep(c) {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out
}
