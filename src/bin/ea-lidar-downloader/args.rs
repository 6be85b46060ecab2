use anyhow::Result;
use clap::{command, value_parser, Arg, ArgAction, ArgMatches};
use std::{path::PathBuf, time::Duration};

use crate::validators::*;
use ea_lidar_downloader::{
    Config, DirectApi, Product, RegionOfInterest, UrlFormat, YearSelection, DIRECT_API_URL,
};

const ROI_ARG: &str = "roi";
const PRODUCTS_ARG: &str = "products";
const YEAR_ARG: &str = "year";
const ALL_YEARS_ARG: &str = "all_years";
const OUTPUT_DIR_ARG: &str = "output_dir";
const PARALLEL_FETCHES_ARG: &str = "num_parallel";
const REQUEST_RETRIES_ARG: &str = "num_retries";
const TIMEOUT_ARG: &str = "timeout";
const PORTAL_TIMEOUT_ARG: &str = "portal_timeout";
const FETCH_EXISTING_ARG: &str = "should_fetch_existing";
const HEADED_ARG: &str = "headed";
const DIRECT_KEY_ARG: &str = "direct_key";
const DIRECT_URL_ARG: &str = "direct_url";
const DRY_RUN_ARG: &str = "dry_run";
const VERBOSE_ARG: &str = "verbose";

pub struct Args {
    pub roi_path: PathBuf,
    pub products: Vec<Product>,
    pub years: YearSelection,
    pub output_dir: PathBuf,
    pub parallel_fetches: u8,
    pub retries: u8,
    pub timeout: Duration,
    pub portal_timeout: Duration,
    pub fetch_existing: bool,
    pub headless: bool,
    pub direct_key: Option<String>,
    pub direct_url: String,
    pub dry_run: bool,
    pub verbose: bool,
}

impl Args {
    pub fn parse() -> Self {
        let matches = get_matches();

        let year = matches.get_one::<String>(YEAR_ARG).unwrap();
        let years = match (year.as_str(), matches.get_flag(ALL_YEARS_ARG)) {
            // `latest` is the default; with --all-years it means "everything"
            ("latest", false) => YearSelection::Latest,
            ("latest", true) => YearSelection::All,
            (y, false) => YearSelection::Exactly(y.parse().unwrap()),
            (y, true) => YearSelection::Since(y.parse().unwrap()),
        };

        Self {
            roi_path: matches.get_one::<PathBuf>(ROI_ARG).unwrap().clone(),
            products: matches
                .get_many::<Product>(PRODUCTS_ARG)
                .unwrap()
                .copied()
                .collect(),
            years,
            output_dir: matches.get_one::<PathBuf>(OUTPUT_DIR_ARG).unwrap().clone(),
            parallel_fetches: *matches.get_one::<u8>(PARALLEL_FETCHES_ARG).unwrap(),
            retries: *matches.get_one::<u8>(REQUEST_RETRIES_ARG).unwrap(),
            timeout: Duration::from_secs(*matches.get_one::<u64>(TIMEOUT_ARG).unwrap()),
            portal_timeout: Duration::from_secs(
                *matches.get_one::<u64>(PORTAL_TIMEOUT_ARG).unwrap(),
            ),
            fetch_existing: matches.get_flag(FETCH_EXISTING_ARG),
            headless: !matches.get_flag(HEADED_ARG),
            direct_key: matches.get_one::<String>(DIRECT_KEY_ARG).cloned(),
            direct_url: matches.get_one::<String>(DIRECT_URL_ARG).unwrap().clone(),
            dry_run: matches.get_flag(DRY_RUN_ARG),
            verbose: matches.get_flag(VERBOSE_ARG),
        }
    }

    /// Reads the ROI file and assembles the fetch configuration.
    pub fn into_config(self) -> Result<Config> {
        let roi = RegionOfInterest::from_path(&self.roi_path)?;

        let direct_api = self.direct_key.map(|key| {
            DirectApi::with_url(UrlFormat::from_string(self.direct_url), key)
        });

        Ok(Config {
            roi,
            products: self.products,
            years: self.years,
            fetch_existing: self.fetch_existing,
            fetch_rate: self.parallel_fetches,
            output_folder: self.output_dir,
            request_retries_amount: self.retries,
            timeout: self.timeout,
            portal_timeout: self.portal_timeout,
            headless: self.headless,
            direct_api,
        })
    }
}

fn get_matches() -> ArgMatches {
    command!()
        .arg(
            Arg::new(ROI_ARG)
                .help("GeoJSON file with the region of interest to download tiles for")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(PRODUCTS_ARG)
                .help("The LiDAR products to download (dsm, dtm, point-cloud, national)")
                .required(true)
                .value_parser(is_product)
                .value_delimiter(',')
                .short('p')
                .long("products"),
        )
        .arg(
            Arg::new(YEAR_ARG)
                .help("The survey year to download, or `latest`")
                .value_parser(is_year)
                .default_value("latest")
                .short('y')
                .long("year"),
        )
        .arg(
            Arg::new(ALL_YEARS_ARG)
                .help("Download all offered years (from --year onwards if one is given)")
                .action(ArgAction::SetTrue)
                .long("all-years"),
        )
        .arg(
            Arg::new(PARALLEL_FETCHES_ARG)
                .help("The amount of assets fetched in parallel.")
                .value_parser(value_parser!(u8).range(1..))
                .default_value("5")
                .short('r')
                .long("rate"),
        )
        .arg(
            Arg::new(REQUEST_RETRIES_ARG)
                .help("The amount of times to retry a failed download.")
                .value_parser(value_parser!(u8).range(1..))
                .default_value("3")
                .long("retries"),
        )
        .arg(
            Arg::new(TIMEOUT_ARG)
                .help("The timeout (in seconds) for fetching a single asset. Pass 0 for no timeout.")
                .value_parser(value_parser!(u64))
                .default_value("30")
                .short('t')
                .long("timeout"),
        )
        .arg(
            Arg::new(PORTAL_TIMEOUT_ARG)
                .help("How long (in seconds) to wait for portal elements to appear. The portal can take minutes to process an upload.")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("300")
                .long("portal-timeout"),
        )
        .arg(
            Arg::new(OUTPUT_DIR_ARG)
                .help("The folder to output the downloaded files to.")
                .default_value("output")
                .value_parser(value_parser!(PathBuf))
                .short('o')
                .long("output"),
        )
        .arg(
            Arg::new(FETCH_EXISTING_ARG)
                .help("Fetch assets that we've already downloaded (this usually isn't required)")
                .action(ArgAction::SetTrue)
                .long("fetch-existing"),
        )
        .arg(
            Arg::new(HEADED_ARG)
                .help("Show the automated browser window instead of running it headless")
                .action(ArgAction::SetTrue)
                .long("headed"),
        )
        .arg(
            Arg::new(DIRECT_KEY_ARG)
                .help("Subscription key for the direct tile API. When given, tiles are fetched without a browser; requires an explicit --year.")
                .long("direct-key"),
        )
        .arg(
            Arg::new(DIRECT_URL_ARG)
                .help("The direct tile API URL with format specifiers `{product}`, `{year}`, `{tile}` and `{key}`.")
                .default_value(DIRECT_API_URL)
                .long("direct-url"),
        )
        .arg(
            Arg::new(DRY_RUN_ARG)
                .help("Don't actually fetch anything, just determine how many tiles would be queried.")
                .action(ArgAction::SetTrue)
                .long("dry-run"),
        )
        .arg(
            Arg::new(VERBOSE_ARG)
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .short('v')
                .long("verbose"),
        )
        .get_matches()
}
