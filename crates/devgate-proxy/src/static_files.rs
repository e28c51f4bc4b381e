use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::ProxyError;

const INDEX_FILE: &str = "index.html";
const MIN_COMPRESS_SIZE: usize = 1024;

/// A file read from the static root, ready to be written to the client
#[derive(Debug, Clone)]
pub struct StaticFile {
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub content_type: String,
    pub etag: String,
}

impl StaticFile {
    pub fn cache_control(&self, request_path: &str) -> &'static str {
        if is_cacheable_static_asset(request_path) {
            "public, max-age=31536000, immutable"
        } else {
            "public, max-age=0, must-revalidate"
        }
    }
}

/// Serves files from a single root directory
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path to a file inside the root.
    ///
    /// `/` and directories map to `index.html`; extension-less paths that
    /// don't exist fall back to the root `index.html` (client-side routing).
    /// Returns `None` for missing files and for anything resolving outside
    /// the root.
    pub async fn resolve(&self, request_path: &str) -> Result<Option<PathBuf>, ProxyError> {
        let decoded = match urlencoding::decode(request_path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => return Ok(None),
        };
        if decoded.contains('\0') {
            return Ok(None);
        }

        let relative = decoded.trim_start_matches('/');
        let relative = if relative.is_empty() {
            INDEX_FILE
        } else {
            relative
        };

        let canonical_root = match fs::canonicalize(&self.root).await {
            Ok(path) => path,
            Err(e) => {
                debug!(
                    "Static root {} is not available: {}",
                    self.root.display(),
                    e
                );
                return Ok(None);
            }
        };

        let candidate = match fs::canonicalize(canonical_root.join(relative)).await {
            Ok(path) => path,
            Err(_) => {
                let last_segment = relative.rsplit('/').next().unwrap_or(relative);
                if last_segment.contains('.') {
                    return Ok(None);
                }
                match fs::canonicalize(canonical_root.join(INDEX_FILE)).await {
                    Ok(path) => path,
                    Err(_) => return Ok(None),
                }
            }
        };

        if !candidate.starts_with(&canonical_root) {
            warn!(
                "Path traversal attempt detected: {} -> {}",
                request_path,
                candidate.display()
            );
            return Ok(None);
        }

        let file_path = if fs::metadata(&candidate).await?.is_dir() {
            candidate.join(INDEX_FILE)
        } else {
            candidate
        };

        match fs::metadata(&file_path).await {
            Ok(meta) if meta.is_file() => Ok(Some(file_path)),
            _ => Ok(None),
        }
    }

    /// Resolve and read a file
    pub async fn load(&self, request_path: &str) -> Result<Option<StaticFile>, ProxyError> {
        let Some(path) = self.resolve(request_path).await? else {
            return Ok(None);
        };

        let content = fs::read(&path).await?;
        let content_type = content_type_for(&path);
        let etag = generate_etag(&content);

        Ok(Some(StaticFile {
            path,
            content,
            content_type,
            etag,
        }))
    }
}

/// MIME type with a utf-8 charset for text types
pub fn content_type_for(path: &Path) -> String {
    use mime_guess::mime;

    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    let is_text = guessed.type_() == mime::TEXT
        || guessed.subtype() == mime::JAVASCRIPT
        || guessed.subtype() == mime::JSON;

    if is_text {
        format!("{}; charset=utf-8", guessed.essence_str())
    } else {
        guessed.essence_str().to_string()
    }
}

/// Long-term caching for fingerprinted build assets
pub fn is_cacheable_static_asset(path: &str) -> bool {
    ["/assets/", ".chunk.", ".hash."]
        .iter()
        .any(|pattern| path.contains(pattern))
}

/// Weak ETag from the content hash
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("W/\"{:x}-{:x}\"", content.len(), hasher.finish())
}

pub fn should_compress_content(content_type: &str, content_length: usize) -> bool {
    if content_length < MIN_COMPRESS_SIZE {
        return false;
    }

    [
        "text/",
        "application/javascript",
        "application/json",
        "application/xml",
        "image/svg+xml",
    ]
    .iter()
    .any(|ct| content_type.starts_with(ct))
}

pub fn compress_gzip(content: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    encoder.finish()
}

/// Whether an Accept-Encoding value allows gzip
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    accept_encoding
        .map(|ae| {
            ae.split(',')
                .any(|enc| enc.trim().split(';').next() == Some("gzip"))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    fn static_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std_fs::create_dir_all(dir.path().join("assets")).unwrap();
        std_fs::create_dir_all(dir.path().join("docs")).unwrap();
        std_fs::write(
            dir.path().join("index.html"),
            "<!DOCTYPE html><html><head><title>Threat Map</title></head></html>",
        )
        .unwrap();
        std_fs::write(dir.path().join("assets/app.js"), "console.log('loaded');").unwrap();
        std_fs::write(dir.path().join("docs/index.html"), "<h1>docs</h1>").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let dir = static_root();
        let files = StaticFiles::new(dir.path());

        let file = files.load("/").await.unwrap().unwrap();
        assert!(file.path.ends_with("index.html"));
        assert!(file.content_type.starts_with("text/html"));
        assert!(String::from_utf8_lossy(&file.content).contains("Threat Map"));
    }

    #[tokio::test]
    async fn test_asset_and_content_type() {
        let dir = static_root();
        let files = StaticFiles::new(dir.path());

        let file = files.load("/assets/app.js").await.unwrap().unwrap();
        assert!(file.content_type.contains("javascript"));
        assert_eq!(
            file.cache_control("/assets/app.js"),
            "public, max-age=31536000, immutable"
        );
    }

    #[tokio::test]
    async fn test_directory_serves_its_index() {
        let dir = static_root();
        let files = StaticFiles::new(dir.path());

        let path = files.resolve("/docs").await.unwrap().unwrap();
        assert!(path.ends_with("docs/index.html"));
    }

    #[tokio::test]
    async fn test_spa_fallback_only_without_extension() {
        let dir = static_root();
        let files = StaticFiles::new(dir.path());

        let path = files.resolve("/dashboard/threats").await.unwrap().unwrap();
        assert!(path.ends_with("index.html"));
        assert!(files.resolve("/missing.css").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_traversal_is_refused() {
        let dir = static_root();
        let inner = dir.path().join("assets");
        let files = StaticFiles::new(&inner);

        assert!(files.resolve("/../index.html").await.unwrap().is_none());
        assert!(files.resolve("/%2e%2e/index.html").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_root_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = StaticFiles::new(dir.path().join("dist"));
        assert!(files.load("/").await.unwrap().is_none());
    }

    #[test]
    fn test_etag_changes_with_content() {
        assert_eq!(generate_etag(b"a"), generate_etag(b"a"));
        assert_ne!(generate_etag(b"a"), generate_etag(b"b"));
        assert!(generate_etag(b"a").starts_with("W/\""));
    }

    #[test]
    fn test_compression_rules() {
        assert!(!should_compress_content("text/html", 100));
        assert!(should_compress_content("text/html; charset=utf-8", 4096));
        assert!(should_compress_content("application/javascript", 4096));
        assert!(!should_compress_content("image/png", 4096));

        let body = "x".repeat(4096);
        let compressed = compress_gzip(body.as_bytes()).unwrap();
        assert!(compressed.len() < body.len());
    }

    #[test]
    fn test_accepts_gzip() {
        assert!(accepts_gzip(Some("gzip, deflate, br")));
        assert!(accepts_gzip(Some("br;q=1.0, gzip;q=0.8")));
        assert!(!accepts_gzip(Some("br")));
        assert!(!accepts_gzip(None));
    }
}
