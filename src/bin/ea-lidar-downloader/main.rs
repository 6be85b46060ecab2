mod args;
mod validators;

use anyhow::Result;
use args::Args;
use ea_lidar_downloader::fetch;
use log::LevelFilter;
use simple_logger::SimpleLogger;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    SimpleLogger::new()
        .with_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init()?;

    let dry_run = args.dry_run;
    let config = args.into_config()?;

    if dry_run {
        let query_count = config.tiles().len() * config.products.len();

        eprintln!(
            "would query {} tile/product combinations (approx {}, assuming 25 MB per tile)",
            query_count,
            pretty_bytes::converter::convert((query_count as f64) * 25_000_000f64)
        );

        Ok(())
    } else {
        fetch(config).await
    }
}
