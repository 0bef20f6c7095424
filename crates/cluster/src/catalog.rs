//! Download of the published Thoth s2i image catalog.

use thoth_s2i_common::{Error, Result};
use thoth_s2i_core::ThothImageCatalog;
use tracing::debug;

/// Fetch the s2i-thoth README from `url` and collect the images it lists.
pub async fn fetch_catalog(url: &str) -> Result<ThothImageCatalog> {
    debug!("Fetching Thoth s2i images from {}", url);

    let response = reqwest::get(url)
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| Error::Catalog(format!("failed to obtain Thoth's s2i images from {}: {}", url, e)))?;
    let text = response
        .text()
        .await
        .map_err(|e| Error::Catalog(format!("failed to read {}: {}", url, e)))?;

    let catalog = ThothImageCatalog::from_readme(&text);
    debug!("Found {} Thoth s2i images", catalog.images().len());
    Ok(catalog)
}
