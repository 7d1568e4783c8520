use chrono::{DateTime, Utc};
use nom::{
    bytes::complete::take_till,
    multi::fill,
    number::{
        complete::{f64 as double, le_u32},
        Endianness,
    },
    sequence::pair,
    IResult,
};
use tracing::{debug, trace};

use crate::{
    georef::{DatumShift, GeorefCoefficients, Wgs84Coordinates},
    validation::ValidationIssue,
    Error,
};

/// Signature of a QCT map
pub const MAGIC_MAP: u32 = 0x1423_D5FE;
/// Signature of a QCT index map
pub const MAGIC_INDEX: u32 = 0x1423_D5FF;

/// Known format versions
pub const KNOWN_VERSIONS: [u32; 3] = [
    // Quick Chart
    0x0000_0002,
    // Quick Chart with licence management
    0x0000_0004,
    // QC3
    0x2000_0001,
];

const HEADER_WORDS: usize = GeorefCoefficients::BYTE_OFFSET / 4;

/// Header fields as stored: integers and file offsets
///
/// ## Layout
///
/// All fields are little-endian `u32`s; pointers are absolute file offsets and zero means
/// the field is absent.
/// ```"not rust"
/// 0x00 magic              0x30 datum (ptr)
/// 0x04 version            0x34 depths (ptr)
/// 0x08 width in tiles     0x38 heights (ptr)
/// 0x0C height in tiles    0x3C projection (ptr)
/// 0x10 long title (ptr)   0x40 flags
/// 0x14 name (ptr)         0x44 original file name (ptr)
/// 0x18 identifier (ptr)   0x48 original file size
/// 0x1C edition (ptr)      0x4C original creation time (unix seconds)
/// 0x20 revision (ptr)     0x50 reserved
/// 0x24 keywords (ptr)     0x54 extended data (ptr)
/// 0x28 copyright (ptr)    0x58 outline point count
/// 0x2C scale (ptr)        0x5C outline (ptr)
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawHeader {
    pub magic: u32,
    pub version: u32,
    pub width_tiles: u32,
    pub height_tiles: u32,
    pub strings: [u32; 12],
    pub flags: u32,
    pub original_file_name: u32,
    pub original_file_size: u32,
    pub original_creation_time: u32,
    pub extended_data: u32,
    pub outline_len: u32,
    pub outline: u32,
}

impl RawHeader {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < GeorefCoefficients::BYTE_OFFSET {
            return Err(Error::Truncated {
                section: "header",
                required: GeorefCoefficients::BYTE_OFFSET,
                actual: bytes.len(),
            });
        }
        let (_, words) = header_words(bytes)
            .map_err(|e| Error::Malformed(format!("header: {e:?}")))?;
        let mut strings = [0; 12];
        strings.copy_from_slice(&words[4..16]);
        Ok(Self {
            magic: words[0],
            version: words[1],
            width_tiles: words[2],
            height_tiles: words[3],
            strings,
            flags: words[16],
            original_file_name: words[17],
            original_file_size: words[18],
            original_creation_time: words[19],
            // words[20] is reserved
            extended_data: words[21],
            outline_len: words[22],
            outline: words[23],
        })
    }
}

fn header_words(input: &[u8]) -> IResult<&[u8], [u32; HEADER_WORDS]> {
    let mut words = [0; HEADER_WORDS];
    let (input, ()) = fill(le_u32, &mut words)(input)?;
    Ok((input, words))
}

/// Descriptive metadata of a QCT map
#[derive(Default, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct MapMetadata {
    /// Long title of the map
    pub title: Option<String>,
    /// Short name
    pub name: Option<String>,
    /// Publisher identifier
    pub identifier: Option<String>,
    /// Edition
    pub edition: Option<String>,
    /// Revision
    pub revision: Option<String>,
    /// Search keywords
    pub keywords: Option<String>,
    /// Copyright notice
    pub copyright: Option<String>,
    /// Scale, e.g. `1:50000`
    pub scale: Option<String>,
    /// Geodetic datum name
    pub datum: Option<String>,
    /// Depth units
    pub depths: Option<String>,
    /// Height units
    pub heights: Option<String>,
    /// Projection name
    pub projection: Option<String>,
}

/// The optional extended data block
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ExtendedData {
    /// Map type
    pub map_type: Option<String>,
    /// Datum shift applied around the polynomials
    pub datum_shift: Option<DatumShift>,
    /// Name of the distribution disk
    pub disk_name: Option<String>,
}

/// Decoded QCT header
#[derive(Default, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct QctHeader {
    /// Signature, see [`MAGIC_MAP`] and [`MAGIC_INDEX`]
    pub magic: u32,
    /// Format version, see [`KNOWN_VERSIONS`]
    pub version: u32,
    /// Raster width in 64 pixel tiles
    pub width_tiles: u32,
    /// Raster height in 64 pixel tiles
    pub height_tiles: u32,
    /// Descriptive strings
    pub metadata: MapMetadata,
    /// Raw flag word
    pub flags: u32,
    /// Name of the file the map was produced from
    pub original_file_name: Option<String>,
    /// Size of the file the map was produced from
    pub original_file_size: u32,
    /// Creation time of the file the map was produced from
    pub original_creation_time: Option<DateTime<Utc>>,
    /// Extended data block
    pub extended: Option<ExtendedData>,
    /// Border of the mapped area, in geographic coordinates
    pub outline: Vec<Wgs84Coordinates>,
}

impl QctHeader {
    /// Follows every pointer of `raw` into `bytes`.
    ///
    /// Pointers past the end of the file are recorded in `issues` and the field is left empty.
    pub(crate) fn resolve(raw: &RawHeader, bytes: &[u8], issues: &mut Vec<ValidationIssue>) -> Self {
        const STRING_FIELDS: [&str; 12] = [
            "title",
            "name",
            "identifier",
            "edition",
            "revision",
            "keywords",
            "copyright",
            "scale",
            "datum",
            "depths",
            "heights",
            "projection",
        ];
        let mut strings = STRING_FIELDS
            .into_iter()
            .zip(raw.strings)
            .map(|(field, ptr)| read_string(bytes, field, ptr, issues));
        let mut next = || strings.next().flatten();
        let metadata = MapMetadata {
            title: next(),
            name: next(),
            identifier: next(),
            edition: next(),
            revision: next(),
            keywords: next(),
            copyright: next(),
            scale: next(),
            datum: next(),
            depths: next(),
            heights: next(),
            projection: next(),
        };
        debug!(?metadata, "resolved metadata strings");

        let original_file_name =
            read_string(bytes, "original file name", raw.original_file_name, issues);
        let original_creation_time = match raw.original_creation_time {
            0 => None,
            t => DateTime::from_timestamp(i64::from(t), 0),
        };
        let extended = read_extended(bytes, raw.extended_data, issues);
        let outline = read_outline(bytes, raw.outline_len, raw.outline, issues);
        trace!("outline has {} points", outline.len());

        Self {
            magic: raw.magic,
            version: raw.version,
            width_tiles: raw.width_tiles,
            height_tiles: raw.height_tiles,
            metadata,
            flags: raw.flags,
            original_file_name,
            original_file_size: raw.original_file_size,
            original_creation_time,
            extended,
            outline,
        }
    }

    /// The datum shift of the extended data block, or no shift
    #[must_use]
    pub fn datum_shift(&self) -> DatumShift {
        self.extended
            .as_ref()
            .and_then(|e| e.datum_shift)
            .unwrap_or_default()
    }
}

/// Returns the bytes from `ptr` to the end of the file, or records an issue
fn section<'a>(
    bytes: &'a [u8],
    field: &'static str,
    ptr: u32,
    len: usize,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a [u8]> {
    let start = usize::try_from(ptr).ok()?;
    match start.checked_add(len) {
        Some(end) if end <= bytes.len() && start > 0 => Some(&bytes[start..]),
        _ => {
            issues.push(ValidationIssue::PointerOutOfRange { field, offset: ptr });
            None
        }
    }
}

fn read_string(
    bytes: &[u8],
    field: &'static str,
    ptr: u32,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    if ptr == 0 {
        return None;
    }
    let input = section(bytes, field, ptr, 1, issues)?;
    let res: IResult<&[u8], &[u8]> = take_till(|b| b == 0)(input);
    // take_till on a complete slice cannot fail
    let (_, raw) = res.ok()?;
    // strings are stored as Latin-1
    Some(raw.iter().copied().map(char::from).collect())
}

fn read_extended(
    bytes: &[u8],
    ptr: u32,
    issues: &mut Vec<ValidationIssue>,
) -> Option<ExtendedData> {
    if ptr == 0 {
        return None;
    }
    let input = section(bytes, "extended data", ptr, 12, issues)?;
    let mut words = [0; 3];
    let res: IResult<&[u8], ()> = fill(le_u32, &mut words)(input);
    res.ok()?;
    let [map_type, datum_shift, disk_name] = words;

    let datum_shift = match datum_shift {
        0 => None,
        ptr => section(bytes, "datum shift", ptr, 16, issues)
            .and_then(|input| coordinate_pair(input).ok())
            .map(|(_, (north, east))| DatumShift { north, east }),
    };
    debug!(?datum_shift, "read extended data");

    Some(ExtendedData {
        map_type: read_string(bytes, "map type", map_type, issues),
        datum_shift,
        disk_name: read_string(bytes, "disk name", disk_name, issues),
    })
}

fn read_outline(
    bytes: &[u8],
    len: u32,
    ptr: u32,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<Wgs84Coordinates> {
    if len == 0 || ptr == 0 {
        return Vec::new();
    }
    let Some(byte_len) = usize::try_from(len).ok().and_then(|n| n.checked_mul(16)) else {
        issues.push(ValidationIssue::PointerOutOfRange {
            field: "outline",
            offset: ptr,
        });
        return Vec::new();
    };
    let Some(mut input) = section(bytes, "outline", ptr, byte_len, issues) else {
        return Vec::new();
    };
    let mut outline = Vec::with_capacity(byte_len / 16);
    for _ in 0..len {
        let Ok((rest, (latitude, longitude))) = coordinate_pair(input) else {
            break;
        };
        outline.push(Wgs84Coordinates {
            longitude,
            latitude,
        });
        input = rest;
    }
    outline
}

/// Two native-endian doubles, stored latitude (or north) first
fn coordinate_pair(input: &[u8]) -> IResult<&[u8], (f64, f64)> {
    pair(double(Endianness::Native), double(Endianness::Native))(input)
}
