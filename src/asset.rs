use anyhow::{Context, Result};
use futures::prelude::*;
use reqwest::StatusCode;
use std::{path::Path, time::Duration};
use tokio::{fs, io::AsyncWriteExt};

use crate::fetch::BACKOFF_DELAY;
use crate::grid::GridTile;
use crate::product::Product;

/// A single downloadable file located for the ROI, either scraped from the
/// portal's tile list or constructed for the direct tile API.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Asset {
    /// The displayed name, e.g. `LIDAR-DTM-1m-2022-SU20ne`.
    pub name: String,
    /// Where to fetch the file from.
    pub url: String,
    /// The file name to save the download under.
    pub file_name: String,
    pub product: Product,
    pub year: String,
}

impl Asset {
    /// An asset scraped from the portal's tile list. The local file name is
    /// taken from the URL's last path segment, falling back to the displayed
    /// name when the URL has none.
    pub fn from_portal_link(name: String, url: String, product: Product, year: String) -> Self {
        let file_name = url
            .split('/')
            .last()
            .map(|segment| segment.split('?').next().unwrap_or(segment))
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| name.clone());

        Self {
            name,
            url,
            file_name,
            product,
            year,
        }
    }

    /// Whether the asset's name references one of the given tiles.
    /// Portal asset names embed the tile reference in varying casing.
    pub fn matches_tiles(&self, tiles: &[GridTile]) -> bool {
        let name = self.name.to_uppercase();
        tiles
            .iter()
            .any(|tile| name.contains(&tile.name().to_uppercase()))
    }

    /// Fetches the asset to `output_folder` using the given HTTP client.
    pub async fn fetch_to(
        &self,
        client: &reqwest::Client,
        output_folder: &Path,
        fetch_existing: bool,
    ) -> Result<()> {
        let output_file = output_folder.join(&self.file_name);

        // if the asset's already been downloaded, skip it
        if !fetch_existing && output_file.exists() {
            return Ok(());
        }

        let response = loop {
            let raw_response = client
                .get(&self.url)
                .send()
                .await
                .with_context(|| format!("failed fetching {}", self.name))?;

            if raw_response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = raw_response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|val| val.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(BACKOFF_DELAY);

                tokio::time::sleep(retry_after).await;
                continue;
            }

            break raw_response.error_for_status().with_context(|| {
                format!("received invalid status code fetching {}", self.name)
            })?;
        };

        let mut output = fs::File::create(&output_file).await.with_context(|| {
            format!("failed creating output file {}", output_file.display())
        })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.with_context(|| format!("failed streaming {} to disk", self.name))?;
            output.write_all(&chunk).await?;
        }

        output.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_comes_from_url_path() {
        let asset = Asset::from_portal_link(
            "LIDAR-DTM-1m-2022-SU20ne".to_owned(),
            "https://example.com/downloads/LIDAR-DTM-1m-2022-SU20ne.zip?token=abc".to_owned(),
            Product::Dtm,
            "2022".to_owned(),
        );
        assert_eq!(asset.file_name, "LIDAR-DTM-1m-2022-SU20ne.zip");
    }

    #[test]
    fn file_name_falls_back_to_display_name() {
        let asset = Asset::from_portal_link(
            "some-tile".to_owned(),
            "https://example.com/downloads/".to_owned(),
            Product::Dsm,
            "2022".to_owned(),
        );
        assert_eq!(asset.file_name, "some-tile");
    }

    #[test]
    fn matches_tiles_ignores_case() {
        let tiles = vec!["SU20ne".parse().unwrap()];
        let asset = Asset::from_portal_link(
            "national-lidar-programme-dsm-2022-su20NE".to_owned(),
            "https://example.com/x.zip".to_owned(),
            Product::Dsm,
            "2022".to_owned(),
        );
        assert!(asset.matches_tiles(&tiles));

        let other = Asset::from_portal_link(
            "national-lidar-programme-dsm-2022-st57se".to_owned(),
            "https://example.com/y.zip".to_owned(),
            Product::Dsm,
            "2022".to_owned(),
        );
        assert!(!other.matches_tiles(&tiles));
    }
}
