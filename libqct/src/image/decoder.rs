use tracing::{debug, trace, warn};

use super::{
    palette::{Palette, PALETTE_END},
    tiles::TileIndex,
};
use crate::{
    georef::{Georef, GeorefCoefficients},
    header::{QctHeader, RawHeader, KNOWN_VERSIONS, MAGIC_INDEX, MAGIC_MAP},
    validation::ValidationIssue,
    Error,
};

/// How strictly a QCT file is decoded
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ParseMode {
    /// Reject files failing any validation check
    #[default]
    #[strum(serialize = "strict")]
    Strict,
    /// Keep decoding past validation failures, flagging the result.
    /// Truncated files are still rejected
    #[strum(serialize = "force")]
    Force,
}

/// Whether a decoded file passed every validation check
#[derive(Debug, Clone, PartialEq)]
pub enum Validity {
    /// Every check passed
    Valid,
    /// Decoded in [`ParseMode::Force`] despite the listed issues
    Forced(Vec<ValidationIssue>),
}

/// Steps of decoding a single file, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub(crate) enum DecodeState {
    Unparsed,
    ParsingHeader,
    ParsingMetadata,
    ValidatingOrForcing,
    Ready,
    Failed,
}

/// Everything the decoder extracts from the container
#[derive(Debug)]
pub(crate) struct Decoded {
    pub header: QctHeader,
    pub georef: Georef,
    pub palette: Option<Palette>,
    pub tiles: Option<TileIndex>,
    pub validity: Validity,
}

/// Sequential decoder over the bytes of one file
pub(crate) struct Decoder<'a> {
    bytes: &'a [u8],
    mode: ParseMode,
    state: DecodeState,
    issues: Vec<ValidationIssue>,
}

impl<'a> Decoder<'a> {
    pub(crate) const fn new(bytes: &'a [u8], mode: ParseMode) -> Self {
        Self {
            bytes,
            mode,
            state: DecodeState::Unparsed,
            issues: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) const fn state(&self) -> DecodeState {
        self.state
    }

    fn advance(&mut self, next: DecodeState) {
        trace!(from = %self.state, to = %next, "decoder state");
        self.state = next;
    }

    /// Runs every step, ending in [`DecodeState::Ready`] or [`DecodeState::Failed`]
    pub(crate) fn run(&mut self) -> Result<Decoded, Error> {
        let decoded = self.steps();
        match &decoded {
            Ok(_) => self.advance(DecodeState::Ready),
            Err(e) => {
                debug!("decoding failed in state {}: {e}", self.state);
                self.advance(DecodeState::Failed);
            }
        }
        decoded
    }

    fn steps(&mut self) -> Result<Decoded, Error> {
        self.advance(DecodeState::ParsingHeader);
        if self.bytes.is_empty() {
            return Err(Error::Malformed("file is empty".into()));
        }
        let raw = RawHeader::parse(self.bytes)?;
        debug!(
            "magic {:#010x}, version {:#x}, {}x{} tiles",
            raw.magic, raw.version, raw.width_tiles, raw.height_tiles
        );

        self.advance(DecodeState::ParsingMetadata);
        let coefficients = GeorefCoefficients::parse(self.bytes)?;
        let header = QctHeader::resolve(&raw, self.bytes, &mut self.issues);
        let palette = Palette::parse(self.bytes);
        let tiles = if palette.is_some() {
            TileIndex::parse(
                self.bytes,
                raw.width_tiles,
                raw.height_tiles,
                &mut self.issues,
            )
        } else {
            self.issues.push(ValidationIssue::RasterSectionTruncated {
                required: PALETTE_END,
                actual: self.bytes.len(),
            });
            None
        };

        self.advance(DecodeState::ValidatingOrForcing);
        self.validate(&raw, &coefficients);
        let validity = match (self.mode, self.issues.is_empty()) {
            (_, true) => Validity::Valid,
            (ParseMode::Strict, false) => {
                return Err(Error::ValidationFailed(std::mem::take(&mut self.issues)));
            }
            (ParseMode::Force, false) => {
                for issue in &self.issues {
                    warn!("force decoding past: {issue}");
                }
                Validity::Forced(std::mem::take(&mut self.issues))
            }
        };

        Ok(Decoded {
            header,
            georef: Georef::new(coefficients),
            palette,
            tiles,
            validity,
        })
    }

    fn validate(&mut self, raw: &RawHeader, coefficients: &GeorefCoefficients) {
        if raw.magic != MAGIC_MAP && raw.magic != MAGIC_INDEX {
            self.issues.push(ValidationIssue::BadSignature(raw.magic));
        }
        if !KNOWN_VERSIONS.contains(&raw.version) {
            self.issues.push(ValidationIssue::UnknownVersion(raw.version));
        }
        if raw.width_tiles == 0 || raw.height_tiles == 0 {
            self.issues.push(ValidationIssue::EmptyTileGrid {
                width: raw.width_tiles,
                height: raw.height_tiles,
            });
        }
        self.issues.extend(
            coefficients
                .named_terms()
                .into_iter()
                .filter(|(_, value)| !value.is_finite())
                .map(|(name, value)| ValidationIssue::NonFiniteCoefficient { name, value }),
        );
    }
}
