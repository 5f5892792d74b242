use std::fmt;

use scroll::{ctx::TryFromCtx, Pread};

/// Packed cylinder/head/sector address as stored in a partition entry.
///
/// byte 0: head, byte 1: sector (bits 0-5) + cylinder bits 8-9 (bits 6-7),
/// byte 2: cylinder bits 0-7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chs {
    pub head: u8,
    pub cylinder: u16, // 0..=1023
    pub sector: u8,    // 0..=63
}

impl Chs {
    pub const SZ: usize = 3;

    /// Written in place of the real geometry once a partition ends past
    /// what CHS can address (~8GB); the LBA fields are authoritative then.
    pub const MAX: Chs = Chs {
        head: 254,
        cylinder: 1023,
        sector: 63,
    };

    pub fn decode(raw: [u8; 3]) -> Self {
        let sector = raw[1] & 0x3F;
        let cylinder = ((raw[1] & 0xC0) as u16) << 2 | raw[2] as u16;
        Chs {
            head: raw[0],
            cylinder,
            sector,
        }
    }

    #[allow(dead_code)]
    pub fn encode(&self) -> [u8; 3] {
        [
            self.head,
            (self.sector & 0x3F) | ((self.cylinder >> 8) as u8 & 0x03) << 6,
            self.cylinder as u8,
        ]
    }

    pub fn is_overflow_sentinel(&self) -> bool {
        *self == Self::MAX
    }
}

impl<'a> TryFromCtx<'a, scroll::Endian> for Chs {
    type Error = scroll::Error;
    fn try_from_ctx(from: &'a [u8], ctx: scroll::Endian) -> Result<(Self, usize), Self::Error> {
        let raw: [u8; 3] = from.pread_with(0, ctx)?;
        Ok((Chs::decode(raw), Self::SZ))
    }
}

impl fmt::Display for Chs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h:{} c:{} s:{}", self.head, self.cylinder, self.sector)
    }
}
