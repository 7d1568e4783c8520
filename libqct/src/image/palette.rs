use nom::{multi::fill, number::complete::le_u32, IResult};

/// Offset of the palette in a QCT file
pub const PALETTE_OFFSET: usize = 0x1A0;
/// Number of palette entries
pub const PALETTE_LEN: usize = 256;
/// First byte past the palette
pub const PALETTE_END: usize = PALETTE_OFFSET + PALETTE_LEN * 4;

/// The 256 colour palette every pixel index refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 3]; PALETTE_LEN],
}

impl Palette {
    /// Reads the palette, entries are stored as little-endian `0x00RRGGBB`
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let input = bytes.get(PALETTE_OFFSET..PALETTE_END)?;
        let (_, entries) = entries(input).ok()?;
        Some(Self {
            colors: entries.map(|entry| {
                let [blue, green, red, _] = entry.to_le_bytes();
                [red, green, blue]
            }),
        })
    }

    /// Creates a palette from RGB triplets
    #[must_use]
    pub const fn new(colors: [[u8; 3]; PALETTE_LEN]) -> Self {
        Self { colors }
    }

    /// The RGB colour of a pixel index
    #[must_use]
    pub const fn color(&self, index: u8) -> [u8; 3] {
        self.colors[index as usize]
    }
}

fn entries(input: &[u8]) -> IResult<&[u8], [u32; PALETTE_LEN]> {
    let mut entries = [0; PALETTE_LEN];
    let (input, ()) = fill(le_u32, &mut entries)(input)?;
    Ok((input, entries))
}
