use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Area, BoundingRect, CoordsIter, MapCoords, Simplify};
use geo_types::{Coord, Geometry, MultiPolygon};

use crate::grid::{GridExtent, GridTile};
use crate::osgb;

/// The portal rejects upload geometries with more vertices than this.
pub const MAX_VERTICES: usize = 1_000;

/// Above this footprint (in m²) the portal truncates results, so the ROI is
/// queried tile by tile instead.
const MAX_UPLOAD_AREA: f64 = 561_333_677.0;

const SIMPLIFY_START_TOLERANCE: f64 = 10.0;
const SIMPLIFY_MAX_TOLERANCE: f64 = 1_000.0;

/// The region of interest to download tiles for, held in EPSG:27700
/// (British National Grid) coordinates.
///
/// # Example
/// ```rust,no_run
/// # use ea_lidar_downloader::RegionOfInterest;
/// let roi = RegionOfInterest::from_path("area.geojson").unwrap();
/// for tile in roi.tiles() {
///     println!("{}", tile);
/// }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RegionOfInterest {
    geometry: MultiPolygon<f64>,
}

/// How the ROI is presented to the portal.
#[derive(Clone, Debug, PartialEq)]
pub enum UploadPlan {
    /// A single upload of the (possibly simplified) ROI geometry.
    Whole(MultiPolygon<f64>),
    /// One upload per intersecting tile square, for ROIs the portal would
    /// reject or truncate as a single geometry.
    PerTile(Vec<GridTile>),
}

impl RegionOfInterest {
    /// Reads an ROI from a GeoJSON file containing polygon geometries.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading ROI file {}", path.display()))?;

        Self::from_geojson(&raw)
            .with_context(|| format!("failed parsing ROI file {}", path.display()))
    }

    /// Parses an ROI from GeoJSON text.
    ///
    /// Geographic (lon/lat) coordinates are converted to the National Grid.
    /// Coordinates whose magnitude exceeds lon/lat ranges are taken to be
    /// EPSG:27700 easting/northing already.
    pub fn from_geojson(raw: &str) -> Result<Self> {
        let geojson = raw.parse().context("invalid GeoJSON")?;
        let collection =
            geojson::quick_collection(&geojson).context("unsupported GeoJSON structure")?;

        let mut polygons = Vec::new();
        for geometry in collection {
            match geometry {
                Geometry::Polygon(p) => polygons.push(p),
                Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
                // points/lines don't describe a download area
                _ => {}
            }
        }

        if polygons.is_empty() {
            bail!("ROI contains no polygon geometries");
        }

        let geometry = MultiPolygon::new(polygons);
        let geometry = if is_geographic(&geometry) {
            geometry.map_coords(|c: Coord<f64>| {
                let (x, y) = osgb::wgs84_to_osgb(c.x, c.y);
                Coord { x, y }
            })
        } else {
            geometry
        };

        Ok(Self { geometry })
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn vertex_count(&self) -> usize {
        self.geometry.coords_count()
    }

    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    /// The ROI's bounding extent on the National Grid.
    pub fn extent(&self) -> Option<GridExtent> {
        self.geometry.bounding_rect().map(|rect| {
            GridExtent::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
        })
    }

    /// All 5km grid tiles whose square intersects the ROI.
    pub fn tiles(&self) -> Vec<GridTile> {
        match self.extent() {
            Some(extent) => extent
                .tiles()
                .filter(|tile| tile.intersects(&self.geometry))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Decides how the ROI is uploaded to the portal. Multi-part and
    /// oversized ROIs are queried per tile; everything else is uploaded as
    /// one geometry, simplified until it fits the portal's vertex limit.
    pub fn upload_plan(&self) -> Result<UploadPlan> {
        if self.geometry.0.len() > 1 || self.area() > MAX_UPLOAD_AREA {
            return Ok(UploadPlan::PerTile(self.tiles()));
        }

        let mut geometry = self.geometry.clone();
        let mut tolerance = SIMPLIFY_START_TOLERANCE;
        while geometry.coords_count() > MAX_VERTICES {
            if tolerance > SIMPLIFY_MAX_TOLERANCE {
                bail!("could not simplify the ROI below {} vertices", MAX_VERTICES);
            }

            geometry = geometry.simplify(&tolerance);
            tolerance *= 2.0;
        }

        Ok(UploadPlan::Whole(geometry))
    }
}

/// A geometry every coordinate of which fits in lon/lat ranges is assumed to
/// be geographic. Actual National Grid coordinates are several orders of
/// magnitude larger.
fn is_geographic(geometry: &MultiPolygon<f64>) -> bool {
    geometry
        .coords_iter()
        .all(|c| c.x.abs() <= 180.0 && c.y.abs() <= 90.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGS84_SQUARE: &str = r#"{
        "type": "Feature",
        "properties": {},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [-2.63, 51.43],
                [-2.56, 51.43],
                [-2.56, 51.47],
                [-2.63, 51.47],
                [-2.63, 51.43]
            ]]
        }
    }"#;

    fn osgb_square(min_e: f64, min_n: f64, size: f64) -> String {
        format!(
            r#"{{"type": "Polygon", "coordinates": [[
                [{0}, {1}], [{2}, {1}], [{2}, {3}], [{0}, {3}], [{0}, {1}]
            ]]}}"#,
            min_e,
            min_n,
            min_e + size,
            min_n + size,
        )
    }

    #[test]
    fn converts_geographic_coordinates() {
        let roi = RegionOfInterest::from_geojson(WGS84_SQUARE).unwrap();
        let extent = roi.extent().unwrap();

        // Bristol area, 100km square ST
        assert!(extent.min_easting > 300_000.0 && extent.max_easting < 400_000.0);
        assert!(extent.min_northing > 100_000.0 && extent.max_northing < 200_000.0);
    }

    #[test]
    fn keeps_grid_coordinates() {
        let roi = RegionOfInterest::from_geojson(&osgb_square(422_000.0, 103_000.0, 1_000.0))
            .unwrap();
        let extent = roi.extent().unwrap();
        assert_eq!(extent.min_easting, 422_000.0);
        assert_eq!(extent.max_northing, 104_000.0);
    }

    #[test]
    fn small_square_intersects_single_tile() {
        let roi = RegionOfInterest::from_geojson(&osgb_square(421_000.0, 101_000.0, 1_000.0))
            .unwrap();
        let tiles = roi.tiles();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].name(), "SU20sw");
    }

    #[test]
    fn straddling_square_intersects_four_tiles() {
        let roi = RegionOfInterest::from_geojson(&osgb_square(424_000.0, 104_000.0, 2_000.0))
            .unwrap();
        assert_eq!(roi.tiles().len(), 4);
    }

    #[test]
    fn rejects_non_areal_geojson() {
        let point = r#"{"type": "Point", "coordinates": [0.0, 51.0]}"#;
        assert!(RegionOfInterest::from_geojson(point).is_err());
    }

    #[test]
    fn simplifies_dense_geometries() {
        // A near-circle with far more vertices than the portal accepts.
        let coords: Vec<String> = (0..=2_000)
            .map(|i| {
                let angle = i as f64 / 2_000.0 * std::f64::consts::TAU;
                format!(
                    "[{}, {}]",
                    422_500.0 + 2_000.0 * angle.cos(),
                    102_500.0 + 2_000.0 * angle.sin()
                )
            })
            .collect();
        let raw = format!(
            r#"{{"type": "Polygon", "coordinates": [[{}]]}}"#,
            coords.join(",")
        );

        let roi = RegionOfInterest::from_geojson(&raw).unwrap();
        assert!(roi.vertex_count() > MAX_VERTICES);

        match roi.upload_plan().unwrap() {
            UploadPlan::Whole(geometry) => {
                assert!(geometry.coords_count() <= MAX_VERTICES)
            }
            UploadPlan::PerTile(_) => panic!("small ROI should upload whole"),
        }
    }

    #[test]
    fn oversized_roi_uploads_per_tile() {
        // 30km x 30km, well above the portal's area cutoff.
        let roi = RegionOfInterest::from_geojson(&osgb_square(400_000.0, 100_000.0, 30_000.0))
            .unwrap();
        match roi.upload_plan().unwrap() {
            UploadPlan::PerTile(tiles) => assert_eq!(tiles.len(), 36),
            UploadPlan::Whole(_) => panic!("oversized ROI should upload per tile"),
        }
    }
}
