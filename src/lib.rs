//! Download Environment Agency LiDAR tiles to your disk en-masse.
//!
//! **Use with absolute caution.** Bulk-downloading survey data can hog down
//! the download portal easily. I am not responsible for any damage this tool
//! may cause.
//!
//! The tool reads a region of interest from a GeoJSON file, works out which
//! OS National Grid 5km tiles it touches, locates the matching assets on the
//! DEFRA survey data portal through an automated browser session (the portal
//! has no stable public API) and streams the files to disk.
//!
//! # Usage
//!
//! This tool is available on [crates.io](https://crates.io) and can be
//! installed via `cargo install ea-lidar-downloader`. It features a helpful
//! CLI you can access via `-h` / `--help`.
//!
//! It is also available as a library.
//!
//! # CLI Example
//!
//! ```bash
//! ea-lidar-downloader ./area.geojson \
//!   --products dtm,dsm \
//!   --year 2022 \
//!   --output ./lidar \
//!   --rate 4
//! ```
//!
//! # Library Example
//! ```rust,no_run
//! use ea_lidar_downloader::{fetch, Config, Product, RegionOfInterest, YearSelection};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = Config {
//!     roi: RegionOfInterest::from_path("./area.geojson").expect("failed reading ROI"),
//!     products: vec![Product::Dtm],
//!     years: YearSelection::Latest,
//!     fetch_existing: false,
//!     fetch_rate: 4,
//!     output_folder: "./lidar".into(),
//!     request_retries_amount: 3,
//!     timeout: Duration::from_secs(30),
//!     portal_timeout: Duration::from_secs(300),
//!     headless: true,
//!     direct_api: None,
//! };
//!
//! fetch(config).await.expect("failed fetching tiles");
//! # }
//! ```

mod asset;
mod config;
mod direct;
mod fetch;
mod grid;
mod osgb;
mod portal;
mod product;
mod roi;
mod upload;
mod url;

pub use asset::Asset;
pub use config::{Config, YearSelection};
pub use direct::DirectApi;
pub use fetch::fetch;
pub use grid::{GridExtent, GridTile};
pub use portal::{PortalSession, PORTAL_URL};
pub use product::Product;
pub use roi::{RegionOfInterest, UploadPlan};
pub use url::{UrlFormat, DIRECT_API_URL};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn tile_panics_unaligned() {
        GridTile::new(1_234, 5_000);
    }

    #[test]
    #[should_panic]
    fn tile_panics_off_grid() {
        GridTile::new(800_000, 5_000);
    }

    #[test]
    fn tile_reference() {
        let tile = GridTile::from_point(425_123.0, 105_987.0).unwrap();
        assert_eq!(tile.name(), "SU20ne");
        assert_eq!((tile.easting, tile.northing), (425_000, 105_000));
    }

    #[test]
    fn wgs84_roi_maps_onto_the_grid() {
        // A small box over Bath should land in 100km square ST.
        let roi = RegionOfInterest::from_geojson(
            r#"{"type": "Polygon", "coordinates": [[
                [-2.37, 51.37], [-2.34, 51.37], [-2.34, 51.39],
                [-2.37, 51.39], [-2.37, 51.37]
            ]]}"#,
        )
        .unwrap();

        let tiles = roi.tiles();
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.name().starts_with("ST")));
    }
}
