use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use geo_types::{LineString, MultiPolygon};
use shapefile::dbase;
use tempfile::TempDir;
use zip::write::FileOptions;

use crate::roi::{RegionOfInterest, UploadPlan};

/// ESRI well-known text for EPSG:27700, written alongside the shapefile so
/// the portal interprets the coordinates as National Grid.
const OSGB_PRJ: &str = r#"PROJCS["British_National_Grid",GEOGCS["GCS_OSGB_1936",DATUM["D_OSGB_1936",SPHEROID["Airy_1830",6377563.396,299.3249646]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",400000.0],PARAMETER["False_Northing",-100000.0],PARAMETER["Central_Meridian",-2.0],PARAMETER["Scale_Factor",0.9996012717],PARAMETER["Latitude_Of_Origin",49.0],UNIT["Meter",1.0]]"#;

/// A single zipped shapefile ready for the portal's upload input.
#[derive(Debug)]
pub struct UploadBundle {
    pub label: String,
    pub zip_path: PathBuf,
}

/// The upload bundles for one ROI. The backing files live in a temporary
/// directory that is removed when this is dropped.
#[derive(Debug)]
pub struct UploadSet {
    _dir: TempDir,
    pub bundles: Vec<UploadBundle>,
}

/// Materializes the ROI's upload plan as zipped shapefiles.
pub fn prepare(roi: &RegionOfInterest) -> Result<UploadSet> {
    let dir = TempDir::new().context("failed creating temporary upload directory")?;

    let bundles = match roi.upload_plan()? {
        UploadPlan::Whole(geometry) => vec![write_bundle(dir.path(), "roi", &geometry)?],
        UploadPlan::PerTile(tiles) => tiles
            .iter()
            .map(|tile| {
                let square = MultiPolygon::new(vec![tile.polygon()]);
                write_bundle(dir.path(), &tile.name(), &square)
            })
            .collect::<Result<_>>()?,
    };

    Ok(UploadSet {
        _dir: dir,
        bundles,
    })
}

fn write_bundle(dir: &Path, label: &str, geometry: &MultiPolygon<f64>) -> Result<UploadBundle> {
    let shp_path = dir.join(format!("{}.shp", label));
    write_shapefile(&shp_path, label, geometry)
        .with_context(|| format!("failed writing shapefile for {}", label))?;
    fs::write(shp_path.with_extension("prj"), OSGB_PRJ)?;

    let zip_path = dir.join(format!("{}.zip", label));
    let file = File::create(&zip_path)
        .with_context(|| format!("failed creating {}", zip_path.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for ext in ["shp", "shx", "dbf", "prj"] {
        let part = shp_path.with_extension(ext);
        if !part.exists() {
            continue;
        }

        zip.start_file(format!("{}.{}", label, ext), options)?;
        zip.write_all(&fs::read(&part)?)?;
    }

    zip.finish()?;

    Ok(UploadBundle {
        label: label.to_owned(),
        zip_path,
    })
}

fn write_shapefile(path: &Path, name: &str, geometry: &MultiPolygon<f64>) -> Result<()> {
    let field_name = "NAME"
        .try_into()
        .map_err(|_| anyhow!("invalid dbf field name"))?;
    let table = dbase::TableWriterBuilder::new().add_character_field(field_name, 50);
    let mut writer = shapefile::Writer::from_path(path, table)?;

    let mut rings = Vec::new();
    for polygon in &geometry.0 {
        rings.push(shapefile::PolygonRing::Outer(ring_points(polygon.exterior())));
        for interior in polygon.interiors() {
            rings.push(shapefile::PolygonRing::Inner(ring_points(interior)));
        }
    }

    let shape = shapefile::Polygon::with_rings(rings);
    let mut record = dbase::Record::default();
    record.insert(
        "NAME".to_owned(),
        dbase::FieldValue::Character(Some(name.to_owned())),
    );

    writer.write_shape_and_record(&shape, &record)?;
    Ok(())
}

fn ring_points(ring: &LineString<f64>) -> Vec<shapefile::Point> {
    ring.coords()
        .map(|c| shapefile::Point::new(c.x, c.y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_roi() -> RegionOfInterest {
        let raw = r#"{"type": "Polygon", "coordinates": [[
            [421000.0, 101000.0], [422000.0, 101000.0],
            [422000.0, 102000.0], [421000.0, 102000.0],
            [421000.0, 101000.0]
        ]]}"#;
        RegionOfInterest::from_geojson(raw).unwrap()
    }

    #[test]
    fn bundles_zip_the_full_shapefile_set() {
        let set = prepare(&small_roi()).unwrap();
        assert_eq!(set.bundles.len(), 1);
        assert_eq!(set.bundles[0].label, "roi");

        let file = File::open(&set.bundles[0].zip_path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        let names: Vec<&str> = archive.file_names().collect();

        for expected in ["roi.shp", "roi.shx", "roi.dbf", "roi.prj"] {
            assert!(names.contains(&expected), "missing {} in {:?}", expected, names);
        }
    }

    #[test]
    fn temporary_files_vanish_with_the_set() {
        let set = prepare(&small_roi()).unwrap();
        let zip_path = set.bundles[0].zip_path.clone();
        assert!(zip_path.exists());

        drop(set);
        assert!(!zip_path.exists());
    }
}
