use anyhow::{Context, Result};
use maplit::hashmap;
use std::fmt;
use strfmt::strfmt;

use crate::grid::GridTile;
use crate::product::Product;

/// The survey tiles collection endpoint tiles can be fetched from directly,
/// bypassing the portal, given a subscription key.
pub const DIRECT_API_URL: &str =
    "https://api.agrimetrics.co.uk/tiles/collections/survey/{product}/{year}/1/{tile}?subscription-key={key}";

pub struct UrlFormat {
    format_str: String,
}

impl UrlFormat {
    pub fn from_string(format_str: String) -> Self {
        Self { format_str }
    }

    pub fn tile_url(
        &self,
        product: Product,
        year: &str,
        tile: &GridTile,
        key: &str,
    ) -> Result<String> {
        let vars = hashmap! {
            "product".to_owned() => product.api_slug().to_owned(),
            "year".to_owned() => year.to_owned(),
            "tile".to_owned() => tile.name(),
            "key".to_owned() => key.to_owned(),
        };

        strfmt(&self.format_str, &vars).context("failed formatting URL")
    }
}

impl Default for UrlFormat {
    fn default() -> Self {
        Self::from_string(DIRECT_API_URL.to_owned())
    }
}

impl PartialEq for UrlFormat {
    fn eq(&self, other: &Self) -> bool {
        self.format_str == other.format_str
    }
}

impl fmt::Debug for UrlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlFormat")
            .field("format_str", &self.format_str)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_default_template() {
        let tile: GridTile = "SU20ne".parse().unwrap();
        let url = UrlFormat::default()
            .tile_url(Product::Dsm, "2022", &tile, "public")
            .unwrap();

        assert_eq!(
            url,
            "https://api.agrimetrics.co.uk/tiles/collections/survey/lidar_tiles_dsm/2022/1/SU20ne?subscription-key=public"
        );
    }
}
