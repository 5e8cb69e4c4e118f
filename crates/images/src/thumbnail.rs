use std::{borrow::Cow, sync::OnceLock};

use anyhow::Result;
use bytes::Bytes;
use regex::{NoExpand, Regex};

/// Bundled image served in place of any thumbnail that can't be downloaded.
pub const PLACEHOLDER: &[u8] = include_bytes!("../../../assets/placeholder.webp");

/// Request the uncropped 512x512 variant of a cart icon.
pub fn rewrite_icon_url(icon: &str) -> Cow<'_, str> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(r"=w\d+-h\d+-l\d+-rj\?from=cart").unwrap())
        .replace(icon, NoExpand("=w512-h512?from=cart"))
}

/// Download the thumbnail for `icon`. Never fails: any error yields [`PLACEHOLDER`].
pub async fn fetch_thumbnail(client: &reqwest::Client, icon: &str) -> Bytes {
    let url = rewrite_icon_url(icon);
    match download(client, &url).await {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Failed to fetch thumbnail {}: {}", url, e);
            Bytes::from_static(PLACEHOLDER)
        }
    }
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Bytes> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?)
}
