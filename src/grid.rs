use std::fmt::{self, Debug};

use geo::{Intersects, LineString, MultiPolygon, Polygon};

/// Side length of an addressable LiDAR tile in metres.
pub const TILE_SIZE: u32 = 5_000;

/// Extent of the GB grid: 7 x 13 100km squares.
const GRID_MAX_EASTING: u32 = 700_000;
const GRID_MAX_NORTHING: u32 = 1_300_000;

/// An OS National Grid 5km tile, identified by references like `SU20ne`
/// (100km square letters, 10km square digits, 5km quadrant).
///
/// The contained coordinates are the tile's south-west corner in metres.
///
/// # Example
/// ```rust
/// # use ea_lidar_downloader::GridTile;
/// let tile: GridTile = "SU20ne".parse().unwrap();
/// assert_eq!((tile.easting, tile.northing), (425_000, 105_000));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct GridTile {
    pub easting: u32,
    pub northing: u32,
}

impl GridTile {
    /// Creates a tile from its south-west corner.
    ///
    /// # Panics
    /// Panics if the corner is not aligned to the 5km grid or lies outside
    /// the GB grid extent.
    pub fn new(easting: u32, northing: u32) -> Self {
        assert!(easting % TILE_SIZE == 0 && northing % TILE_SIZE == 0);
        assert!(easting < GRID_MAX_EASTING);
        assert!(northing < GRID_MAX_NORTHING);

        Self { easting, northing }
    }

    /// The tile containing the given easting/northing, or `None` if the
    /// point falls outside the GB grid.
    pub fn from_point(easting: f64, northing: f64) -> Option<Self> {
        if !(0.0..GRID_MAX_EASTING as f64).contains(&easting)
            || !(0.0..GRID_MAX_NORTHING as f64).contains(&northing)
        {
            return None;
        }

        let e = easting as u32 / TILE_SIZE * TILE_SIZE;
        let n = northing as u32 / TILE_SIZE * TILE_SIZE;
        Some(Self::new(e, n))
    }

    /// The tile reference, e.g. `SU20ne`. This is the identifier embedded in
    /// the survey asset names published by the portal.
    pub fn name(&self) -> String {
        let e100k = self.easting / 100_000;
        let n100k = self.northing / 100_000;

        let l1 = (19 - n100k) - (19 - n100k) % 5 + (e100k + 10) / 5;
        let l2 = (19 - n100k) * 5 % 25 + e100k % 5;

        let de = self.easting % 100_000 / 10_000;
        let dn = self.northing % 100_000 / 10_000;

        let ns = if self.northing % 10_000 >= TILE_SIZE { 'n' } else { 's' };
        let ew = if self.easting % 10_000 >= TILE_SIZE { 'e' } else { 'w' };

        format!(
            "{}{}{}{}{}{}",
            index_to_letter(l1),
            index_to_letter(l2),
            de,
            dn,
            ns,
            ew
        )
    }

    /// The tile's square footprint in EPSG:27700 coordinates.
    pub fn polygon(&self) -> Polygon<f64> {
        let e = self.easting as f64;
        let n = self.northing as f64;
        let s = TILE_SIZE as f64;

        Polygon::new(
            LineString::from(vec![(e, n), (e + s, n), (e + s, n + s), (e, n + s), (e, n)]),
            vec![],
        )
    }

    pub fn intersects(&self, geometry: &MultiPolygon<f64>) -> bool {
        geometry.intersects(&self.polygon())
    }
}

impl fmt::Display for GridTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl std::str::FromStr for GridTile {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != 6 {
            return Err("tile reference must have the form `SU20ne`");
        }

        let l1 = letter_to_index(chars[0])?;
        let l2 = letter_to_index(chars[1])?;

        let e100k = (l1 - 2).rem_euclid(5) * 5 + l2.rem_euclid(5);
        let n100k = 19 - l1 / 5 * 5 - l2 / 5;
        if !(0..7).contains(&e100k) || !(0..13).contains(&n100k) {
            return Err("100km square is outside the GB grid");
        }

        let de = chars[2].to_digit(10).ok_or("expected a 10km digit")?;
        let dn = chars[3].to_digit(10).ok_or("expected a 10km digit")?;

        let ns = match chars[4].to_ascii_lowercase() {
            'n' => TILE_SIZE,
            's' => 0,
            _ => return Err("quadrant must be one of ne/nw/se/sw"),
        };
        let ew = match chars[5].to_ascii_lowercase() {
            'e' => TILE_SIZE,
            'w' => 0,
            _ => return Err("quadrant must be one of ne/nw/se/sw"),
        };

        Ok(Self::new(
            e100k as u32 * 100_000 + de * 10_000 + ew,
            n100k as u32 * 100_000 + dn * 10_000 + ns,
        ))
    }
}

/// 100km square letter from a grid index, skipping `I` which the scheme
/// does not use.
fn index_to_letter(idx: u32) -> char {
    let idx = if idx >= 8 { idx + 1 } else { idx };
    (b'A' + idx as u8) as char
}

fn letter_to_index(c: char) -> Result<i32, &'static str> {
    let c = c.to_ascii_uppercase();
    if !c.is_ascii_uppercase() || c == 'I' {
        return Err("invalid 100km square letter");
    }

    let raw = c as i32 - 'A' as i32;
    Ok(if raw > 8 { raw - 1 } else { raw })
}

/// An axis-aligned extent in EPSG:27700 coordinates, used to enumerate
/// candidate tiles before the exact ROI intersection test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridExtent {
    pub min_easting: f64,
    pub min_northing: f64,
    pub max_easting: f64,
    pub max_northing: f64,
}

impl GridExtent {
    /// # Panics
    /// Panics if the minima exceed the maxima.
    pub fn new(min_easting: f64, min_northing: f64, max_easting: f64, max_northing: f64) -> Self {
        assert!(min_easting <= max_easting);
        assert!(min_northing <= max_northing);

        Self {
            min_easting,
            min_northing,
            max_easting,
            max_northing,
        }
    }

    /// Creates an iterator over all 5km tiles touching the extent, clamped
    /// to the GB grid. An extent entirely off-grid yields nothing.
    pub fn tiles(&self) -> impl Iterator<Item = GridTile> + Debug {
        let min_e = align_down(self.min_easting, GRID_MAX_EASTING);
        let max_e = align_up(self.max_easting, GRID_MAX_EASTING);
        let min_n = align_down(self.min_northing, GRID_MAX_NORTHING);
        let max_n = align_up(self.max_northing, GRID_MAX_NORTHING);

        (min_e..max_e).step_by(TILE_SIZE as usize).flat_map(move |e| {
            (min_n..max_n)
                .step_by(TILE_SIZE as usize)
                .map(move |n| GridTile::new(e, n))
        })
    }
}

fn align_down(v: f64, limit: u32) -> u32 {
    // `as` saturates, so negative coordinates clamp to zero.
    (v as u32).min(limit) / TILE_SIZE * TILE_SIZE
}

fn align_up(v: f64, limit: u32) -> u32 {
    ((v.ceil() as u32).min(limit) + TILE_SIZE - 1) / TILE_SIZE * TILE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in ["SU20ne", "ST68nw", "TQ38se", "NY21sw", "HU44ne"] {
            let tile: GridTile = name.parse().unwrap();
            assert_eq!(tile.name(), name);
        }
    }

    #[test]
    fn parses_case_insensitively() {
        let a: GridTile = "st68NW".parse().unwrap();
        let b: GridTile = "ST68nw".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn st68nw_corner() {
        let tile: GridTile = "ST68nw".parse().unwrap();
        assert_eq!((tile.easting, tile.northing), (360_000, 185_000));
    }

    #[test]
    fn rejects_malformed_references() {
        assert!("SU20".parse::<GridTile>().is_err());
        assert!("SI20ne".parse::<GridTile>().is_err());
        assert!("SU2Xne".parse::<GridTile>().is_err());
        assert!("SU20nx".parse::<GridTile>().is_err());
    }

    #[test]
    fn extent_tile_count() {
        // A 10km x 10km extent aligned to the grid covers exactly 4 tiles.
        let extent = GridExtent::new(420_000.0, 100_000.0, 430_000.0, 110_000.0);
        assert_eq!(extent.tiles().count(), 4);
    }

    #[test]
    fn off_grid_extent_is_empty() {
        let extent = GridExtent::new(-20_000.0, -20_000.0, -10_000.0, -10_000.0);
        assert_eq!(extent.tiles().count(), 0);
    }

    #[test]
    fn from_point_rejects_off_grid() {
        assert!(GridTile::from_point(-1.0, 50.0).is_none());
        assert_eq!(
            GridTile::from_point(425_500.0, 105_500.0).map(|t| t.name()),
            Some("SU20ne".to_owned())
        );
    }
}
