use nom::{
    multi::fill,
    number::{complete::f64 as double, Endianness},
    IResult,
};
use tracing::trace;

use crate::Error;

/// Number of terms in one cubic bivariate polynomial
pub const POLYNOMIAL_TERMS: usize = 10;

/// Raw georeferencing coefficients of a QCT file.
///
/// Four independent cubic polynomials, 10 terms each:
///
/// - `eas`/`nor`: geographic → pixel x / pixel y. `x` is longitude, `y` is latitude.
/// - `lat`/`lon`: pixel → latitude / longitude. `x` and `y` are pixel coordinates.
///
/// ## Layout
///
/// The blocks follow the header at [`Self::BYTE_OFFSET`], 80 bytes each, with no gaps.
/// The term order differs between the two pairs and is kept as stored:
///
/// ```"not rust"
/// eas, nor: const, y, x, y², xy, x², y³, y²x, yx², x³
/// lat, lon: const, x, y, x², xy, y², x³, x²y, xy², y³
/// ```
///
/// Values are read as native-endian IEEE-754 doubles, as written by the (little-endian)
/// platform producing QCT files. On a big-endian host the values will be garbage and the
/// non-finite check of the decoder is likely to flag them.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct GeorefCoefficients {
    /// eastings constant
    pub eas: f64,
    pub eas_y: f64,
    pub eas_x: f64,
    pub eas_yy: f64,
    pub eas_xy: f64,
    pub eas_xx: f64,
    pub eas_yyy: f64,
    pub eas_yyx: f64,
    pub eas_yxx: f64,
    pub eas_xxx: f64,

    /// northings constant
    pub nor: f64,
    pub nor_y: f64,
    pub nor_x: f64,
    pub nor_yy: f64,
    pub nor_xy: f64,
    pub nor_xx: f64,
    pub nor_yyy: f64,
    pub nor_yyx: f64,
    pub nor_yxx: f64,
    pub nor_xxx: f64,

    /// latitude constant
    pub lat: f64,
    pub lat_x: f64,
    pub lat_y: f64,
    pub lat_xx: f64,
    pub lat_xy: f64,
    pub lat_yy: f64,
    pub lat_xxx: f64,
    pub lat_xxy: f64,
    pub lat_xyy: f64,
    pub lat_yyy: f64,

    /// longitude constant
    pub lon: f64,
    pub lon_x: f64,
    pub lon_y: f64,
    pub lon_xx: f64,
    pub lon_xy: f64,
    pub lon_yy: f64,
    pub lon_xxx: f64,
    pub lon_xxy: f64,
    pub lon_xyy: f64,
    pub lon_yyy: f64,
}

impl GeorefCoefficients {
    /// Header bytes preceding the coefficient blocks
    pub const BYTE_OFFSET: usize = 0x60;
    /// Size of one coefficient block
    pub const BLOCK_LEN: usize = POLYNOMIAL_TERMS * std::mem::size_of::<f64>();
    /// `eas` block, relative to [`Self::BYTE_OFFSET`]
    pub const EAS_OFFSET: usize = 0x00;
    /// `nor` block, relative to [`Self::BYTE_OFFSET`]
    pub const NOR_OFFSET: usize = 0x50;
    /// `lat` block, relative to [`Self::BYTE_OFFSET`]
    pub const LAT_OFFSET: usize = 0xA0;
    /// `lon` block, relative to [`Self::BYTE_OFFSET`]
    pub const LON_OFFSET: usize = 0xF0;
    /// First byte past the `lon` block
    pub const END: usize = Self::BYTE_OFFSET + Self::LON_OFFSET + Self::BLOCK_LEN;

    /// Reads the four coefficient blocks from the start of a QCT container
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`] if `bytes` is shorter than [`Self::END`]. Nothing is
    /// read in that case.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::END {
            return Err(Error::Truncated {
                section: "georeferencing coefficients",
                required: Self::END,
                actual: bytes.len(),
            });
        }
        let block = |offset: usize| -> Result<[f64; POLYNOMIAL_TERMS], Error> {
            let start = Self::BYTE_OFFSET + offset;
            parse_block(&bytes[start..start + Self::BLOCK_LEN])
                .map(|(_, block)| block)
                .map_err(|e| Error::Malformed(format!("coefficient block at {start:#x}: {e:?}")))
        };
        let eas = block(Self::EAS_OFFSET)?;
        let nor = block(Self::NOR_OFFSET)?;
        let lat = block(Self::LAT_OFFSET)?;
        let lon = block(Self::LON_OFFSET)?;
        trace!(?eas, ?nor, ?lat, ?lon, "read coefficient blocks");

        let [eas, eas_y, eas_x, eas_yy, eas_xy, eas_xx, eas_yyy, eas_yyx, eas_yxx, eas_xxx] = eas;
        let [nor, nor_y, nor_x, nor_yy, nor_xy, nor_xx, nor_yyy, nor_yyx, nor_yxx, nor_xxx] = nor;
        let [lat, lat_x, lat_y, lat_xx, lat_xy, lat_yy, lat_xxx, lat_xxy, lat_xyy, lat_yyy] = lat;
        let [lon, lon_x, lon_y, lon_xx, lon_xy, lon_yy, lon_xxx, lon_xxy, lon_xyy, lon_yyy] = lon;

        Ok(Self {
            eas,
            eas_y,
            eas_x,
            eas_yy,
            eas_xy,
            eas_xx,
            eas_yyy,
            eas_yyx,
            eas_yxx,
            eas_xxx,
            nor,
            nor_y,
            nor_x,
            nor_yy,
            nor_xy,
            nor_xx,
            nor_yyy,
            nor_yyx,
            nor_yxx,
            nor_xxx,
            lat,
            lat_x,
            lat_y,
            lat_xx,
            lat_xy,
            lat_yy,
            lat_xxx,
            lat_xxy,
            lat_xyy,
            lat_yyy,
            lon,
            lon_x,
            lon_y,
            lon_xx,
            lon_xy,
            lon_yy,
            lon_xxx,
            lon_xxy,
            lon_xyy,
            lon_yyy,
        })
    }

    /// Every coefficient with its name, in file order
    #[must_use]
    pub fn named_terms(&self) -> [(&'static str, f64); 4 * POLYNOMIAL_TERMS] {
        [
            ("eas", self.eas),
            ("eas_y", self.eas_y),
            ("eas_x", self.eas_x),
            ("eas_yy", self.eas_yy),
            ("eas_xy", self.eas_xy),
            ("eas_xx", self.eas_xx),
            ("eas_yyy", self.eas_yyy),
            ("eas_yyx", self.eas_yyx),
            ("eas_yxx", self.eas_yxx),
            ("eas_xxx", self.eas_xxx),
            ("nor", self.nor),
            ("nor_y", self.nor_y),
            ("nor_x", self.nor_x),
            ("nor_yy", self.nor_yy),
            ("nor_xy", self.nor_xy),
            ("nor_xx", self.nor_xx),
            ("nor_yyy", self.nor_yyy),
            ("nor_yyx", self.nor_yyx),
            ("nor_yxx", self.nor_yxx),
            ("nor_xxx", self.nor_xxx),
            ("lat", self.lat),
            ("lat_x", self.lat_x),
            ("lat_y", self.lat_y),
            ("lat_xx", self.lat_xx),
            ("lat_xy", self.lat_xy),
            ("lat_yy", self.lat_yy),
            ("lat_xxx", self.lat_xxx),
            ("lat_xxy", self.lat_xxy),
            ("lat_xyy", self.lat_xyy),
            ("lat_yyy", self.lat_yyy),
            ("lon", self.lon),
            ("lon_x", self.lon_x),
            ("lon_y", self.lon_y),
            ("lon_xx", self.lon_xx),
            ("lon_xy", self.lon_xy),
            ("lon_yy", self.lon_yy),
            ("lon_xxx", self.lon_xxx),
            ("lon_xxy", self.lon_xxy),
            ("lon_xyy", self.lon_xyy),
            ("lon_yyy", self.lon_yyy),
        ]
    }

    /// Returns `true` if the pixel → geographic polynomials have no quadratic or cubic
    /// terms, i.e. an affine transform describes them exactly
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_affine(&self) -> bool {
        [
            self.lat_xx,
            self.lat_xy,
            self.lat_yy,
            self.lat_xxx,
            self.lat_xxy,
            self.lat_xyy,
            self.lat_yyy,
            self.lon_xx,
            self.lon_xy,
            self.lon_yy,
            self.lon_xxx,
            self.lon_xxy,
            self.lon_xyy,
            self.lon_yyy,
        ]
        .iter()
        .all(|&term| term == 0.0)
    }
}

fn parse_block(input: &[u8]) -> IResult<&[u8], [f64; POLYNOMIAL_TERMS]> {
    let mut block = [0.0; POLYNOMIAL_TERMS];
    let (input, ()) = fill(double(Endianness::Native), &mut block)(input)?;
    Ok((input, block))
}
