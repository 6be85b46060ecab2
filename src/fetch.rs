use anyhow::{bail, Context, Result};
use clap::crate_version;
use futures::{prelude::*, stream};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::HashSet;
use std::time::Duration;
use tokio::fs;

use crate::asset::Asset;
use crate::config::{Config, YearSelection};
use crate::portal::PortalSession;
use crate::upload;

pub(crate) const BACKOFF_DELAY: Duration = Duration::from_secs(10);
const ZERO_DURATION: Duration = Duration::from_secs(0);

/// Locates all LiDAR assets for the ROI specified in `cfg` and saves them to
/// the file system.
///
/// Assets are enumerated through the download portal (or constructed for the
/// direct tile API if a key is configured), then fetched concurrently at the
/// configured rate. Creates the output directory if needed.
///
/// # Panics
/// Panics if the specified output folder exists and is not a folder but a file.
pub async fn fetch(cfg: Config) -> Result<()> {
    let output_folder = cfg.output_folder.as_path();

    assert!(
        !output_folder.exists() || output_folder.is_dir(),
        "output must be a directory",
    );

    if !output_folder.exists() {
        fs::create_dir_all(output_folder)
            .await
            .context("failed to create root output directory")?;
    }

    let tiles = cfg.tiles();
    if tiles.is_empty() {
        warn!("the ROI doesn't intersect any grid tiles, nothing to download");
        return Ok(());
    }
    info!("ROI intersects {} grid tiles", tiles.len());

    let mut assets: Vec<Asset> = match &cfg.direct_api {
        Some(api) => {
            let YearSelection::Exactly(year) = &cfg.years else {
                bail!("the direct tile API requires an explicit --year");
            };

            api.assets(&cfg.products, *year, &tiles)?
        }
        None => enumerate_via_portal(&cfg)
            .await?
            .into_iter()
            .filter(|asset| asset.matches_tiles(&tiles))
            .collect(),
    };

    // per-tile uploads can list the same asset more than once
    let mut seen = HashSet::new();
    assets.retain(|asset| seen.insert(asset.url.clone()));

    if assets.is_empty() {
        warn!("the portal lists no matching assets for the ROI");
        return Ok(());
    }
    info!("fetching {} assets", assets.len());

    let pb = ProgressBar::new(assets.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:60.cyan/blue} {pos:>4}/{len:4} ETA: {eta} {msg}",
        )?
        .progress_chars("##-"),
    );

    let mut builder = reqwest::Client::builder();
    if cfg.timeout > ZERO_DURATION {
        builder = builder.timeout(cfg.timeout);
    }

    let mut headers = reqwest::header::HeaderMap::new();
    headers.append(
        reqwest::header::USER_AGENT,
        format!("ea-lidar-downloader_{}", crate_version!())
            .parse()
            .unwrap(),
    );

    let client = builder
        .default_headers(headers)
        .build()
        .context("failed creating HTTP client")?;

    let num_retries = cfg.request_retries_amount;
    let fetch_existing = cfg.fetch_existing;

    let progress_bar = pb.wrap_iter(assets.into_iter());
    let s = stream::iter(progress_bar);
    s.for_each_concurrent(cfg.fetch_rate as usize, |asset| {
        let http_client = client.clone();

        async move {
            let mut res = Ok(());

            for _ in 0..num_retries {
                res = asset
                    .fetch_to(&http_client, output_folder, fetch_existing)
                    .await;

                if res.is_ok() {
                    return;
                }

                tokio::time::sleep(BACKOFF_DELAY).await;
            }

            if let Err(e) = res {
                warn!("failed fetching {}: {:?}", asset.name, e);
            }
        }
    })
    .await;

    pb.finish_and_clear();
    info!("done, output is in {}", output_folder.display());

    Ok(())
}

/// Runs the browser-driven enumeration on a blocking task: uploads each
/// bundle of the ROI's upload plan and collects the listed assets.
async fn enumerate_via_portal(cfg: &Config) -> Result<Vec<Asset>> {
    let roi = cfg.roi.clone();
    let products = cfg.products.clone();
    let years = cfg.years.clone();
    let headless = cfg.headless;
    let wait_timeout = cfg.portal_timeout;

    tokio::task::spawn_blocking(move || -> Result<Vec<Asset>> {
        let uploads = upload::prepare(&roi)?;
        let session = PortalSession::open(headless, wait_timeout)?;

        let mut assets = Vec::new();
        for bundle in &uploads.bundles {
            let mut found = session.enumerate(bundle, &products, &years)?;
            assets.append(&mut found);
        }

        Ok(assets)
    })
    .await
    .context("portal enumeration task failed")?
}
