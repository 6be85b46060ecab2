use std::fmt;

/// A downloadable LiDAR product offered by the survey data portal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Product {
    /// Digital Surface Model raster tiles.
    Dsm,
    /// Digital Terrain Model raster tiles.
    Dtm,
    /// Raw point cloud tiles.
    PointCloud,
    /// National LiDAR Programme point cloud tiles.
    NationalPointCloud,
}

impl Product {
    pub const ALL: [Product; 4] = [
        Product::Dsm,
        Product::Dtm,
        Product::PointCloud,
        Product::NationalPointCloud,
    ];

    /// The visible label of the portal's product dropdown entry.
    pub fn portal_label(&self) -> &'static str {
        match self {
            Product::Dsm => "LIDAR Tiles DSM",
            Product::Dtm => "LIDAR Tiles DTM",
            Product::PointCloud => "LIDAR Point Cloud",
            Product::NationalPointCloud => "National LIDAR Programme Point Cloud",
        }
    }

    /// The product path segment of the direct tile API.
    pub fn api_slug(&self) -> &'static str {
        match self {
            Product::Dsm => "lidar_tiles_dsm",
            Product::Dtm => "lidar_tiles_dtm",
            Product::PointCloud => "lidar_point_cloud",
            Product::NationalPointCloud => "national_lidar_programme_point_cloud",
        }
    }

    /// File extension of assets fetched through the direct tile API.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Product::Dsm | Product::Dtm => "tif",
            Product::PointCloud | Product::NationalPointCloud => "laz",
        }
    }

    /// The short key accepted on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            Product::Dsm => "dsm",
            Product::Dtm => "dtm",
            Product::PointCloud => "point-cloud",
            Product::NationalPointCloud => "national",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Product {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dsm" => Ok(Product::Dsm),
            "dtm" => Ok(Product::Dtm),
            "point-cloud" | "point_cloud" => Ok(Product::PointCloud),
            "national" => Ok(Product::NationalPointCloud),
            _ => Err("unrecognized product (expected dsm, dtm, point-cloud or national)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_keys() {
        for product in Product::ALL {
            assert_eq!(product.key().parse::<Product>(), Ok(product));
        }
        assert_eq!("point_cloud".parse::<Product>(), Ok(Product::PointCloud));
        assert!("csm".parse::<Product>().is_err());
    }
}
