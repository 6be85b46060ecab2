use std::{path::PathBuf, time::Duration};

use log::warn;

use crate::direct::DirectApi;
use crate::grid::GridTile;
use crate::product::Product;
use crate::roi::RegionOfInterest;

/// Tile fetching configuration.
#[derive(Debug)]
pub struct Config {
    /// The region to download tiles for.
    pub roi: RegionOfInterest,

    /// The LiDAR products to download.
    pub products: Vec<Product>,

    /// Which of the offered survey years to download.
    pub years: YearSelection,

    /// Whether to re-fetch files that are already downloaded.
    pub fetch_existing: bool,

    /// Maximum number of parallel downloads.
    pub fetch_rate: u8,

    /// The folder to output the data to.
    pub output_folder: PathBuf,

    /// How many times to retry a failed download.
    pub request_retries_amount: u8,

    /// Timeout for fetching a single asset.
    ///
    /// Pass the zero duration to disable the timeout.
    pub timeout: Duration,

    /// How long to wait for portal elements to appear before giving up.
    pub portal_timeout: Duration,

    /// Whether the automated browser runs headless.
    pub headless: bool,

    /// When set, tiles are fetched through the direct tile API instead of
    /// the portal. Requires an explicit year selection.
    pub direct_api: Option<DirectApi>,
}

impl Config {
    /// All grid tiles the configured ROI intersects.
    pub fn tiles(&self) -> Vec<GridTile> {
        self.roi.tiles()
    }
}

/// Which survey years to download out of the ones the portal offers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum YearSelection {
    /// The most recent year only (the default).
    Latest,
    /// One specific year.
    Exactly(u16),
    /// Every offered year.
    All,
    /// Every year from the given one onwards.
    Since(u16),
}

impl YearSelection {
    /// Picks the years to download from the portal's offered year options.
    /// Offers that don't parse as years are ignored.
    pub fn select(&self, offered: &[String]) -> Vec<String> {
        let mut years: Vec<u16> = offered.iter().filter_map(|y| y.trim().parse().ok()).collect();
        years.sort_unstable();
        years.dedup();

        let selected: Vec<String> = match self {
            YearSelection::Latest => {
                years.last().into_iter().map(|y| y.to_string()).collect()
            }
            YearSelection::Exactly(wanted) => years
                .iter()
                .filter(|y| *y == wanted)
                .map(|y| y.to_string())
                .collect(),
            YearSelection::All => years.iter().map(|y| y.to_string()).collect(),
            YearSelection::Since(from) => years
                .iter()
                .filter(|y| *y >= from)
                .map(|y| y.to_string())
                .collect(),
        };

        if selected.is_empty() {
            warn!("none of the offered years ({:?}) match {:?}", offered, self);
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered() -> Vec<String> {
        vec!["2022".to_owned(), "2019".to_owned(), "2017".to_owned()]
    }

    #[test]
    fn latest_picks_newest() {
        assert_eq!(YearSelection::Latest.select(&offered()), vec!["2022"]);
    }

    #[test]
    fn exact_year_must_be_offered() {
        assert_eq!(YearSelection::Exactly(2019).select(&offered()), vec!["2019"]);
        assert!(YearSelection::Exactly(2020).select(&offered()).is_empty());
    }

    #[test]
    fn since_takes_all_from_year() {
        assert_eq!(
            YearSelection::Since(2018).select(&offered()),
            vec!["2019", "2022"]
        );
    }

    #[test]
    fn all_takes_everything_sorted() {
        assert_eq!(
            YearSelection::All.select(&offered()),
            vec!["2017", "2019", "2022"]
        );
    }

    #[test]
    fn unparseable_offers_are_ignored() {
        let offered = vec!["latest".to_owned(), "2021".to_owned()];
        assert_eq!(YearSelection::All.select(&offered), vec!["2021"]);
    }
}
