//! Georeferencing of QCT rasters.
//!
//! A QCT file carries two independently fitted polynomial pairs: `lat`/`lon` map pixel
//! coordinates to WGS84, `eas`/`nor` map WGS84 back to pixels. They are not algebraic
//! inverses of each other, so a round trip only recovers the input up to the residual of
//! the original fit.

mod coefficients;

pub use coefficients::{GeorefCoefficients, POLYNOMIAL_TERMS};
use itertools::iproduct;

/// Position in raster pixel space. Sub-pixel values are meaningful
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct ImageCoordinates {
    /// column
    pub x: f64,
    /// row
    pub y: f64,
}

/// Geographic position in degrees
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Wgs84Coordinates {
    /// degrees east
    pub longitude: f64,
    /// degrees north
    pub latitude: f64,
}

/// Constant datum correction, in degrees.
///
/// Added to the polynomial result when going pixel → geographic and subtracted before
/// evaluation when going geographic → pixel.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct DatumShift {
    /// added to latitude
    pub north: f64,
    /// added to longitude
    pub east: f64,
}

/// Six-parameter affine transform from pixel to geographic coordinates:
///
/// ```"not rust"
/// longitude = a·x + b·y + c
/// latitude  = d·x + e·y + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// Applies the transform to a pixel position
    #[must_use]
    pub fn apply(&self, image: ImageCoordinates) -> Wgs84Coordinates {
        Wgs84Coordinates {
            longitude: self.a * image.x + self.b * image.y + self.c,
            latitude: self.d * image.x + self.e * image.y + self.f,
        }
    }
}

/// A pixel position paired with its geographic position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundControlPoint {
    /// pixel position
    pub image: ImageCoordinates,
    /// geographic position
    pub wgs84: Wgs84Coordinates,
}

/// The georeferencing engine of a QCT file
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Georef {
    /// The raw polynomial coefficients
    pub coefficients: GeorefCoefficients,
}

impl Georef {
    /// Creates a new [`Georef`]
    #[must_use]
    pub const fn new(coefficients: GeorefCoefficients) -> Self {
        Self { coefficients }
    }

    /// See [`to_wgs84_coordinates`]
    #[must_use]
    pub fn to_wgs84_coordinates(
        &self,
        image: ImageCoordinates,
        datum_shift: &DatumShift,
    ) -> Wgs84Coordinates {
        to_wgs84_coordinates(image, &self.coefficients, datum_shift)
    }

    /// See [`to_image_coordinates`]
    #[must_use]
    pub fn to_image_coordinates(
        &self,
        wgs84: Wgs84Coordinates,
        datum_shift: &DatumShift,
    ) -> ImageCoordinates {
        to_image_coordinates(wgs84, &self.coefficients, datum_shift)
    }

    /// Geographic positions of the raster corners, in the order
    /// top-left, top-right, bottom-right, bottom-left
    #[must_use]
    pub fn corners(&self, width: u32, height: u32, datum_shift: &DatumShift) -> [Wgs84Coordinates; 4] {
        let (w, h) = (f64::from(width), f64::from(height));
        [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
            .map(|(x, y)| self.to_wgs84_coordinates(ImageCoordinates { x, y }, datum_shift))
    }

    /// Samples the polynomial on a `grid × grid` lattice spanning the raster, edges
    /// included. Points are ordered row by row. `grid` is clamped to at least 2
    #[must_use]
    pub fn ground_control_points(
        &self,
        width: u32,
        height: u32,
        grid: u32,
        datum_shift: &DatumShift,
    ) -> Vec<GroundControlPoint> {
        let grid = grid.max(2);
        let step = |extent: u32, i: u32| f64::from(extent) * f64::from(i) / f64::from(grid - 1);
        iproduct!(0..grid, 0..grid)
            .map(|(row, column)| {
                let image = ImageCoordinates {
                    x: step(width, column),
                    y: step(height, row),
                };
                GroundControlPoint {
                    image,
                    wgs84: self.to_wgs84_coordinates(image, datum_shift),
                }
            })
            .collect()
    }

    /// The constant and first-order terms of the pixel → geographic polynomials.
    ///
    /// Quadratic and cubic terms are dropped, so this is exact only when
    /// [`GeorefCoefficients::is_affine`] holds.
    #[must_use]
    pub fn affine_approximation(&self, datum_shift: &DatumShift) -> AffineTransform {
        let c = &self.coefficients;
        AffineTransform {
            a: c.lon_x,
            b: c.lon_y,
            c: c.lon + datum_shift.east,
            d: c.lat_x,
            e: c.lat_y,
            f: c.lat + datum_shift.north,
        }
    }
}

/// Maps a pixel position to WGS84 with the `lat`/`lon` polynomials, then applies the
/// datum shift.
///
/// Non-finite coefficients or inputs propagate into the result.
#[must_use]
pub fn to_wgs84_coordinates(
    image: ImageCoordinates,
    c: &GeorefCoefficients,
    datum_shift: &DatumShift,
) -> Wgs84Coordinates {
    let (x, y) = (image.x, image.y);
    let (x2, y2) = (x * x, y * y);
    let (x3, y3) = (x2 * x, y2 * y);

    let longitude = c.lon_xxx * x3
        + c.lon_xx * x2
        + c.lon_x * x
        + c.lon_yyy * y3
        + c.lon_yy * y2
        + c.lon_y * y
        + c.lon_xxy * x2 * y
        + c.lon_xyy * x * y2
        + c.lon_xy * x * y
        + c.lon;

    let latitude = c.lat_xxx * x3
        + c.lat_xx * x2
        + c.lat_x * x
        + c.lat_yyy * y3
        + c.lat_yy * y2
        + c.lat_y * y
        + c.lat_xxy * x2 * y
        + c.lat_xyy * x * y2
        + c.lat_xy * x * y
        + c.lat;

    Wgs84Coordinates {
        longitude: longitude + datum_shift.east,
        latitude: latitude + datum_shift.north,
    }
}

/// Removes the datum shift, then maps a WGS84 position to pixels with the
/// `eas`/`nor` polynomials (longitude as `x`, latitude as `y`).
///
/// Non-finite coefficients or inputs propagate into the result.
#[must_use]
pub fn to_image_coordinates(
    wgs84: Wgs84Coordinates,
    c: &GeorefCoefficients,
    datum_shift: &DatumShift,
) -> ImageCoordinates {
    let lon = wgs84.longitude - datum_shift.east;
    let lat = wgs84.latitude - datum_shift.north;
    let (lon2, lat2) = (lon * lon, lat * lat);
    let (lon3, lat3) = (lon2 * lon, lat2 * lat);

    let x = c.eas_xxx * lon3
        + c.eas_xx * lon2
        + c.eas_x * lon
        + c.eas_yyy * lat3
        + c.eas_yy * lat2
        + c.eas_y * lat
        + c.eas_yxx * lon2 * lat
        + c.eas_yyx * lat2 * lon
        + c.eas_xy * lon * lat
        + c.eas;

    let y = c.nor_xxx * lon3
        + c.nor_xx * lon2
        + c.nor_x * lon
        + c.nor_yyy * lat3
        + c.nor_yy * lat2
        + c.nor_y * lat
        + c.nor_yxx * lon2 * lat
        + c.nor_yyx * lat2 * lon
        + c.nor_xy * lon * lat
        + c.nor;

    ImageCoordinates { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIFT: DatumShift = DatumShift {
        north: 2.0,
        east: 1.0,
    };
    const IMAGE: ImageCoordinates = ImageCoordinates { x: 2.0, y: 3.0 };
    const WGS84: Wgs84Coordinates = Wgs84Coordinates {
        longitude: 3.0,
        latitude: 4.0,
    };

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    /// A calibration taken from a real chart of northern Scotland
    fn chart_coefficients() -> GeorefCoefficients {
        GeorefCoefficients {
            eas: 200_454.0,
            eas_y: -202.649,
            eas_x: 61806.4,
            eas_yy: -9.557_93,
            eas_xy: -655.404,
            eas_xx: 14.0021,
            nor: 2.580_91e6,
            nor_y: -44396.1,
            nor_x: 2309.42,
            nor_yy: -3.569_26,
            nor_xy: -52.2139,
            nor_xx: -175.788,
            lat: 57.7987,
            lat_x: 1.512_47e-6,
            lat_y: -2.238_75e-5,
            lat_xx: -6.907_82e-12,
            lat_xy: -6.5338e-13,
            lat_yy: -4.9429e-14,
            lon: -6.579_64,
            lon_x: 4.193_06e-5,
            lon_y: 2.831_93e-6,
            lon_xx: 1.430_79e-12,
            lon_xy: -2.564_97e-11,
            lon_yy: -1.430_62e-12,
            ..Default::default()
        }
    }

    #[test]
    fn first_order_to_wgs84() {
        let georef = Georef::new(GeorefCoefficients {
            lat: 20.0,
            lat_x: 4.0,
            lat_y: 5.0,
            lon: 10.0,
            lon_x: 2.0,
            lon_y: 3.0,
            ..Default::default()
        });
        let wgs84 = georef.to_wgs84_coordinates(IMAGE, &SHIFT);
        // 10 + 2·2 + 3·3 + 1
        assert_eq!(wgs84.longitude, 24.0);
        // 20 + 4·2 + 5·3 + 2
        assert_eq!(wgs84.latitude, 45.0);
    }

    #[test]
    fn first_order_to_image() {
        let georef = Georef::new(GeorefCoefficients {
            eas: 5.0,
            eas_y: 2.0,
            eas_x: 1.0,
            nor: 10.0,
            nor_y: 4.0,
            nor_x: 3.0,
            ..Default::default()
        });
        // shifted position is (2, 2)
        let image = georef.to_image_coordinates(WGS84, &SHIFT);
        assert_eq!(image.x, 11.0);
        assert_eq!(image.y, 24.0);
    }

    #[test]
    fn second_order_to_wgs84() {
        let georef = Georef::new(GeorefCoefficients {
            lat_xx: 5.0,
            lat_xy: 6.0,
            lat_yy: 7.0,
            lon_xx: 2.0,
            lon_xy: 3.0,
            lon_yy: 4.0,
            ..Default::default()
        });
        let wgs84 = georef.to_wgs84_coordinates(IMAGE, &SHIFT);
        // 2·4 + 3·6 + 4·9 + 1
        assert_eq!(wgs84.longitude, 63.0);
        // 5·4 + 6·6 + 7·9 + 2
        assert_eq!(wgs84.latitude, 121.0);
    }

    #[test]
    fn second_order_to_image() {
        let georef = Georef::new(GeorefCoefficients {
            eas_yy: 3.0,
            eas_xy: 2.0,
            eas_xx: 1.0,
            nor_yy: 6.0,
            nor_xy: 5.0,
            nor_xx: 4.0,
            ..Default::default()
        });
        let image = georef.to_image_coordinates(WGS84, &SHIFT);
        assert_eq!(image.x, 24.0);
        assert_eq!(image.y, 60.0);
    }

    #[test]
    fn third_order_terms_use_their_own_monomials() {
        let georef = Georef::new(GeorefCoefficients {
            lon_xxx: 1.0,
            lon_xxy: 10.0,
            lon_xyy: 100.0,
            lon_yyy: 1000.0,
            eas_xxx: 1.0,
            eas_yxx: 10.0,
            eas_yyx: 100.0,
            eas_yyy: 1000.0,
            ..Default::default()
        });
        let shift = DatumShift::default();
        // 8 + 10·12 + 100·18 + 1000·27
        let wgs84 = georef.to_wgs84_coordinates(IMAGE, &shift);
        assert_eq!(wgs84.longitude, 28_928.0);
        assert_eq!(wgs84.latitude, 0.0);
        // lon' = 3, lat' = 4: 27 + 10·36 + 100·48 + 1000·64
        let image = georef.to_image_coordinates(WGS84, &shift);
        assert_eq!(image.x, 69_187.0);
        assert_eq!(image.y, 0.0);
    }

    #[test]
    fn combined_orders() {
        let georef = Georef::new(GeorefCoefficients {
            eas: 1.0,
            nor: 2.0,
            lat: 3.0,
            lon: 4.0,
            eas_x: 5.0,
            eas_y: 6.0,
            nor_x: 7.0,
            nor_y: 8.0,
            lat_x: 9.0,
            lat_y: 10.0,
            lon_x: 11.0,
            lon_y: 12.0,
            eas_xx: 13.0,
            eas_xy: 14.0,
            eas_yy: 15.0,
            nor_xx: 16.0,
            nor_xy: 17.0,
            nor_yy: 18.0,
            lat_xx: 19.0,
            lat_xy: 20.0,
            lat_yy: 21.0,
            lon_xx: 22.0,
            lon_xy: 23.0,
            lon_yy: 24.0,
            ..Default::default()
        });

        let wgs84 = georef.to_wgs84_coordinates(IMAGE, &SHIFT);
        assert_eq!(wgs84.longitude, 505.0);
        assert_eq!(wgs84.latitude, 438.0);

        let image = georef.to_image_coordinates(WGS84, &SHIFT);
        assert_eq!(image.x, 191.0);
        assert_eq!(image.y, 236.0);
    }

    #[test]
    fn identity_round_trip() {
        let georef = Georef::new(GeorefCoefficients {
            eas_x: 1.0,
            nor_y: 1.0,
            lat_y: 1.0,
            lon_x: 1.0,
            ..Default::default()
        });
        let start = ImageCoordinates { x: 10.0, y: 20.0 };
        let shift = DatumShift {
            north: -0.5,
            east: 0.25,
        };
        let back = georef.to_image_coordinates(georef.to_wgs84_coordinates(start, &shift), &shift);
        assert_close(back.x, start.x, 1e-9);
        assert_close(back.y, start.y, 1e-9);
    }

    #[test]
    fn second_order_round_trip_is_not_identity() {
        let georef = Georef::new(GeorefCoefficients {
            eas_xx: 1.0,
            nor_yy: 1.0,
            lat_yy: 1.0,
            lon_xx: 1.0,
            ..Default::default()
        });
        let shift = DatumShift::default();
        let wgs84 = georef.to_wgs84_coordinates(IMAGE, &shift);
        assert_eq!(wgs84.longitude, 4.0);
        assert_eq!(wgs84.latitude, 9.0);
        let image = georef.to_image_coordinates(wgs84, &shift);
        assert_eq!(image.x, 16.0);
        assert_eq!(image.y, 81.0);
    }

    #[test]
    fn chart_round_trip_within_fit_residual() {
        let georef = Georef::new(chart_coefficients());
        let shift = DatumShift {
            north: 20.0,
            east: 10.0,
        };
        let start = ImageCoordinates { x: 50.0, y: 60.0 };
        let back = georef.to_image_coordinates(georef.to_wgs84_coordinates(start, &shift), &shift);
        assert_close(back.x, start.x, 1.0);
        assert_close(back.y, start.y, 1.0);
    }

    #[test]
    fn chart_to_wgs84_matches_expanded_formula() {
        let c = chart_coefficients();
        let shift = DatumShift {
            north: 20.0,
            east: 10.0,
        };
        let (x, y) = (10.0_f64, 20.0_f64);
        let wgs84 = to_wgs84_coordinates(ImageCoordinates { x, y }, &c, &shift);
        let expected_lon = c.lon
            + c.lon_x * x
            + c.lon_y * y
            + c.lon_xx * x * x
            + c.lon_xy * x * y
            + c.lon_yy * y * y
            + shift.east;
        let expected_lat = c.lat
            + c.lat_x * x
            + c.lat_y * y
            + c.lat_xx * x * x
            + c.lat_xy * x * y
            + c.lat_yy * y * y
            + shift.north;
        assert_close(wgs84.longitude, expected_lon, 1e-9);
        assert_close(wgs84.latitude, expected_lat, 1e-9);
    }

    #[test]
    fn zero_coefficients_map_everything_to_the_shift() {
        let wgs84 = to_wgs84_coordinates(IMAGE, &GeorefCoefficients::default(), &SHIFT);
        assert_eq!(
            wgs84,
            Wgs84Coordinates {
                longitude: 1.0,
                latitude: 2.0
            }
        );
    }

    #[test]
    fn non_finite_values_propagate() {
        let georef = Georef::new(GeorefCoefficients {
            lon_x: f64::NAN,
            lat_y: f64::INFINITY,
            eas: f64::NEG_INFINITY,
            ..Default::default()
        });
        let shift = DatumShift::default();
        let wgs84 = georef.to_wgs84_coordinates(IMAGE, &shift);
        assert!(wgs84.longitude.is_nan());
        assert_eq!(wgs84.latitude, f64::INFINITY);
        let image = georef.to_image_coordinates(WGS84, &shift);
        assert_eq!(image.x, f64::NEG_INFINITY);
        assert_eq!(image.y, 0.0);

        let finite = Georef::new(chart_coefficients());
        let nan_input = ImageCoordinates {
            x: f64::NAN,
            y: 1.0,
        };
        assert!(finite.to_wgs84_coordinates(nan_input, &shift).latitude.is_nan());
    }

    #[test]
    fn corners_follow_raster_outline() {
        let georef = Georef::new(GeorefCoefficients {
            lon_x: 1.0,
            lat_y: -1.0,
            ..Default::default()
        });
        let corners = georef.corners(64, 128, &DatumShift::default());
        let as_pairs = corners.map(|c| (c.longitude, c.latitude));
        assert_eq!(
            as_pairs,
            [(0.0, 0.0), (64.0, 0.0), (64.0, -128.0), (0.0, -128.0)]
        );
    }

    #[test]
    fn ground_control_points_cover_edges() {
        let georef = Georef::new(GeorefCoefficients {
            lon_x: 0.5,
            lat_y: 0.25,
            ..Default::default()
        });
        let gcps = georef.ground_control_points(100, 40, 3, &SHIFT);
        assert_eq!(gcps.len(), 9);
        assert_eq!(gcps[0].image, ImageCoordinates { x: 0.0, y: 0.0 });
        assert_eq!(gcps[1].image, ImageCoordinates { x: 50.0, y: 0.0 });
        assert_eq!(gcps[8].image, ImageCoordinates { x: 100.0, y: 40.0 });
        assert_eq!(gcps[8].wgs84.longitude, 51.0);
        assert_eq!(gcps[8].wgs84.latitude, 12.0);

        assert_eq!(georef.ground_control_points(10, 10, 0, &SHIFT).len(), 4);
    }

    #[test]
    fn affine_approximation_drops_higher_orders() {
        let mut coefficients = chart_coefficients();
        let affine = Georef::new(coefficients).affine_approximation(&SHIFT);
        assert_eq!(affine.c, coefficients.lon + 1.0);
        assert_eq!(affine.f, coefficients.lat + 2.0);

        coefficients.lat_xx = 0.0;
        coefficients.lat_xy = 0.0;
        coefficients.lat_yy = 0.0;
        coefficients.lon_xx = 0.0;
        coefficients.lon_xy = 0.0;
        coefficients.lon_yy = 0.0;
        assert!(coefficients.is_affine());
        let georef = Georef::new(coefficients);
        let affine = georef.affine_approximation(&SHIFT);
        let point = ImageCoordinates { x: 1234.0, y: 567.0 };
        let exact = georef.to_wgs84_coordinates(point, &SHIFT);
        let approx = affine.apply(point);
        assert_close(approx.longitude, exact.longitude, 1e-12);
        assert_close(approx.latitude, exact.latitude, 1e-12);
    }
}
