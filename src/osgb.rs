//! WGS84 to OSGB36 / British National Grid conversion.
//!
//! Implements the Helmert datum shift followed by the Airy 1830 transverse
//! Mercator projection as published in the Ordnance Survey's
//! *A guide to coordinate systems in Great Britain*. Accuracy is within a few
//! metres of the OSTN transformation, which is far below the 5km tile size
//! this crate addresses.

/// Airy 1830 ellipsoid (OSGB36).
const AIRY_A: f64 = 6_377_563.396;
const AIRY_B: f64 = 6_356_256.909;

/// WGS84 ellipsoid.
const WGS84_A: f64 = 6_378_137.0;
const WGS84_B: f64 = 6_356_752.3142;

/// National Grid projection constants.
const SCALE_F0: f64 = 0.999_601_271_7;
const LAT0_DEG: f64 = 49.0;
const LON0_DEG: f64 = -2.0;
const EASTING_ORIGIN: f64 = 400_000.0;
const NORTHING_ORIGIN: f64 = -100_000.0;

/// Helmert transformation parameters, WGS84 -> OSGB36.
const TX: f64 = -446.448;
const TY: f64 = 125.157;
const TZ: f64 = -542.060;
const RX_SEC: f64 = -0.1502;
const RY_SEC: f64 = -0.2470;
const RZ_SEC: f64 = -0.8421;
const SCALE_PPM: f64 = 20.4894;

/// Converts geographic WGS84 coordinates (degrees) to OSGB36 National Grid
/// easting/northing in metres.
pub fn wgs84_to_osgb(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let (x, y, z) = to_cartesian(lon_deg.to_radians(), lat_deg.to_radians(), WGS84_A, WGS84_B);
    let (x, y, z) = helmert(x, y, z);
    let (lon, lat) = from_cartesian(x, y, z, AIRY_A, AIRY_B);

    project(lon, lat)
}

/// Geodetic to geocentric cartesian, height zero.
fn to_cartesian(lon: f64, lat: f64, a: f64, b: f64) -> (f64, f64, f64) {
    let e2 = 1.0 - (b * b) / (a * a);
    let nu = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();

    let x = nu * lat.cos() * lon.cos();
    let y = nu * lat.cos() * lon.sin();
    let z = (1.0 - e2) * nu * lat.sin();

    (x, y, z)
}

fn helmert(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let s = 1.0 + SCALE_PPM / 1e6;
    let rx = (RX_SEC / 3600.0).to_radians();
    let ry = (RY_SEC / 3600.0).to_radians();
    let rz = (RZ_SEC / 3600.0).to_radians();

    let xp = TX + s * x - rz * y + ry * z;
    let yp = TY + rz * x + s * y - rx * z;
    let zp = TZ - ry * x + rx * y + s * z;

    (xp, yp, zp)
}

/// Geocentric cartesian back to geodetic, iterating the latitude until it
/// converges below a tenth of a millimetre.
fn from_cartesian(x: f64, y: f64, z: f64, a: f64, b: f64) -> (f64, f64) {
    let e2 = 1.0 - (b * b) / (a * a);
    let p = x.hypot(y);
    let lon = y.atan2(x);

    let mut lat = z.atan2(p * (1.0 - e2));
    loop {
        let nu = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        let next = (z + e2 * nu * lat.sin()).atan2(p);
        if (next - lat).abs() < 1e-11 {
            lat = next;
            break;
        }
        lat = next;
    }

    (lon, lat)
}

/// Airy 1830 transverse Mercator projection onto the National Grid.
fn project(lon: f64, lat: f64) -> (f64, f64) {
    let a = AIRY_A;
    let b = AIRY_B;
    let lat0 = LAT0_DEG.to_radians();
    let lon0 = LON0_DEG.to_radians();

    let e2 = 1.0 - (b * b) / (a * a);
    let n = (a - b) / (a + b);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let nu = a * SCALE_F0 / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let rho = a * SCALE_F0 * (1.0 - e2) / (1.0 - e2 * sin_lat * sin_lat).powf(1.5);
    let eta2 = nu / rho - 1.0;

    let m = meridional_arc(lat, lat0, b, n);

    let i = m + NORTHING_ORIGIN;
    let ii = nu / 2.0 * sin_lat * cos_lat;
    let iii = nu / 24.0 * sin_lat * cos_lat.powi(3) * (5.0 - tan_lat.powi(2) + 9.0 * eta2);
    let iiia = nu / 720.0 * sin_lat * cos_lat.powi(5)
        * (61.0 - 58.0 * tan_lat.powi(2) + tan_lat.powi(4));
    let iv = nu * cos_lat;
    let v = nu / 6.0 * cos_lat.powi(3) * (nu / rho - tan_lat.powi(2));
    let vi = nu / 120.0 * cos_lat.powi(5)
        * (5.0 - 18.0 * tan_lat.powi(2)
            + tan_lat.powi(4)
            + 14.0 * eta2
            - 58.0 * tan_lat.powi(2) * eta2);

    let dl = lon - lon0;

    let northing = i + ii * dl.powi(2) + iii * dl.powi(4) + iiia * dl.powi(6);
    let easting = EASTING_ORIGIN + iv * dl + v * dl.powi(3) + vi * dl.powi(5);

    (easting, northing)
}

fn meridional_arc(lat: f64, lat0: f64, b: f64, n: f64) -> f64 {
    let dlat = lat - lat0;
    let slat = lat + lat0;

    b * SCALE_F0
        * ((1.0 + n + 5.0 / 4.0 * n.powi(2) + 5.0 / 4.0 * n.powi(3)) * dlat
            - (3.0 * n + 3.0 * n.powi(2) + 21.0 / 8.0 * n.powi(3)) * dlat.sin() * slat.cos()
            + (15.0 / 8.0 * n.powi(2) + 15.0 / 8.0 * n.powi(3))
                * (2.0 * dlat).sin()
                * (2.0 * slat).cos()
            - 35.0 / 24.0 * n.powi(3) * (3.0 * dlat).sin() * (3.0 * slat).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_os_worked_example() {
        // The worked example from the OS guide: 52°39'27.2531"N 1°43'4.5177"E
        // in OSGB36 terms maps to 651409.903E 313177.270N.
        let lat = (52.0 + 39.0 / 60.0 + 27.2531 / 3600.0f64).to_radians();
        let lon = (1.0 + 43.0 / 60.0 + 4.5177 / 3600.0f64).to_radians();

        let (e, n) = project(lon, lat);
        assert!((e - 651_409.903).abs() < 0.01, "easting {e}");
        assert!((n - 313_177.270).abs() < 0.01, "northing {n}");
    }

    #[test]
    fn converts_wgs84_coordinates() {
        // Same point expressed in WGS84; the Helmert shift is only good to a
        // few metres so allow a loose tolerance.
        let (e, n) = wgs84_to_osgb(1.716_038, 52.657_977);
        assert!((e - 651_409.0).abs() < 10.0, "easting {e}");
        assert!((n - 313_177.0).abs() < 10.0, "northing {n}");
    }

    #[test]
    fn greenwich_area_is_in_tq() {
        let (e, n) = wgs84_to_osgb(0.0, 51.4779);
        assert!((500_000.0..600_000.0).contains(&e), "easting {e}");
        assert!((100_000.0..200_000.0).contains(&n), "northing {n}");
    }
}
