use anyhow::Result;

use crate::asset::Asset;
use crate::grid::GridTile;
use crate::product::Product;
use crate::url::UrlFormat;

/// Access to the direct tile API, which serves single tiles by reference
/// without a browser in the loop, given a subscription key.
#[derive(Debug, PartialEq)]
pub struct DirectApi {
    pub url: UrlFormat,
    pub subscription_key: String,
}

impl DirectApi {
    pub fn new(subscription_key: String) -> Self {
        Self {
            url: UrlFormat::default(),
            subscription_key,
        }
    }

    pub fn with_url(url: UrlFormat, subscription_key: String) -> Self {
        Self {
            url,
            subscription_key,
        }
    }

    /// The assets for every product/tile combination in the given year.
    ///
    /// The direct API has no enumeration endpoint, so tiles the survey never
    /// covered only surface as failed downloads later.
    pub fn assets(&self, products: &[Product], year: u16, tiles: &[GridTile]) -> Result<Vec<Asset>> {
        let year = year.to_string();
        let mut assets = Vec::with_capacity(products.len() * tiles.len());

        for &product in products {
            for tile in tiles {
                let url = self
                    .url
                    .tile_url(product, &year, tile, &self.subscription_key)?;

                assets.push(Asset {
                    name: format!("{}-{}-{}", product.api_slug(), year, tile),
                    file_name: format!(
                        "{}_{}_{}.{}",
                        product.api_slug(),
                        year,
                        tile,
                        product.file_extension()
                    ),
                    url,
                    product,
                    year: year.clone(),
                });
            }
        }

        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_an_asset_per_product_and_tile() {
        let api = DirectApi::new("public".to_owned());
        let tiles: Vec<GridTile> =
            vec!["SU20ne".parse().unwrap(), "SU20nw".parse().unwrap()];

        let assets = api
            .assets(&[Product::Dtm, Product::PointCloud], 2022, &tiles)
            .unwrap();

        assert_eq!(assets.len(), 4);
        assert_eq!(assets[0].file_name, "lidar_tiles_dtm_2022_SU20ne.tif");
        assert!(assets[0].url.contains("subscription-key=public"));
        assert_eq!(assets[3].file_name, "lidar_point_cloud_2022_SU20nw.laz");
    }
}
