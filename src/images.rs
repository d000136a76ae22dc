use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

// `[alt](https://host/path.ext)`; the extension must end the URL, so a
// trailing query string prevents a match.
static MARKDOWN_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[.*?\]\((https?://\S+\.(?i:jpg|jpeg|png|gif))\)").unwrap()
});

/// Image URLs referenced by markdown links in `text`, in order, duplicates kept.
pub fn extract_image_urls(text: &str) -> Vec<String> {
    MARKDOWN_IMAGE_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Whether the URL's path (query and fragment ignored) ends in an image extension.
pub fn is_image_url(url: &str) -> bool {
    let path = url_path(url).to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Path exactly as written in the URL: no percent-encoding, no dot-segment
/// normalization.
fn raw_path(url: &str) -> &str {
    let rest = url.split(['?', '#']).next().unwrap_or_default();
    match rest.split_once("://") {
        Some((_, after_scheme)) => after_scheme.find('/').map_or("", |i| &after_scheme[i..]),
        None => rest,
    }
}

fn file_name_for(url: &str) -> Option<String> {
    let name = raw_path(url).rsplit('/').next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Downloads images into an export folder.
#[derive(Clone, Default)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` into `folder/<basename>`, overwriting any file of that name.
    ///
    /// Network failures and non-200 responses are logged and yield `Ok(None)`.
    /// Only local write errors are returned as `Err`. Different URLs sharing
    /// a basename overwrite each other.
    pub async fn download_image(&self, url: &str, folder: &Path) -> Result<Option<PathBuf>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            debug!("Skipping non-HTTP image URL {}", url);
            return Ok(None);
        }
        let Some(name) = file_name_for(url) else {
            warn!("Failed to download image from {}: no file name in URL path", url);
            return Ok(None);
        };

        let bytes = match self.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to download image from {}: {}", url, e);
                return Ok(None);
            }
        };

        let target = folder.join(name);
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("Failed to write image {}", target.display()))?;
        debug!("Saved {} ({} bytes) to {}", url, bytes.len(), target.display());
        Ok(Some(target))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            anyhow::bail!("HTTP {}", status);
        }
        // body is fully read before anything touches disk
        Ok(response.bytes().await?.to_vec())
    }
}

/// Path of a downloaded file relative to the export folder, with `/` separators
/// so it works as a markdown link.
pub fn relative_link(local: &Path, base: &Path) -> String {
    let rel = local.strip_prefix(base).unwrap_or(local);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
