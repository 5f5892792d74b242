#![allow(dead_code)]

// References:
// [1] https://en.wikipedia.org/wiki/Master_boot_record
// [2] https://en.wikipedia.org/wiki/Partition_type

use scroll::{ctx::TryFromCtx, Pread, LE};

use super::chs::Chs;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid boot signature 0x{0:04X}")]
    InvalidSignature(u16),
    #[error("scroll read failed")]
    Scroll(#[from] scroll::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    NonBootable,
    Bootable,
    NonBootableLba,
    BootableLba,
    Invalid(u8),
}

impl From<u8> for PartitionStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::NonBootable,
            0x80 => Self::Bootable,
            0x01 => Self::NonBootableLba,
            0x81 => Self::BootableLba,
            raw => Self::Invalid(raw),
        }
    }
}

impl PartitionStatus {
    pub fn raw(&self) -> u8 {
        match *self {
            Self::NonBootable => 0x00,
            Self::Bootable => 0x80,
            Self::NonBootableLba => 0x01,
            Self::BootableLba => 0x81,
            Self::Invalid(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    Unused,
    Ntfs,
    LinuxSwap,
    Linux,
    /// 0x05 (CHS addressed) or 0x0F (LBA addressed)
    Extended { lba: bool },
    Unknown(u8),
}

impl From<u8> for PartitionType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Unused,
            0x07 => Self::Ntfs,
            0x82 => Self::LinuxSwap,
            0x83 => Self::Linux,
            0x05 => Self::Extended { lba: false },
            0x0F => Self::Extended { lba: true },
            raw => Self::Unknown(raw),
        }
    }
}

impl PartitionType {
    pub fn raw(&self) -> u8 {
        match *self {
            Self::Unused => 0x00,
            Self::Ntfs => 0x07,
            Self::LinuxSwap => 0x82,
            Self::Linux => 0x83,
            Self::Extended { lba: false } => 0x05,
            Self::Extended { lba: true } => 0x0F,
            Self::Unknown(raw) => raw,
        }
    }

    #[inline]
    pub fn in_use(&self) -> bool {
        !matches!(*self, Self::Unused)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    pub status: PartitionStatus,
    pub start_chs: Chs,
    pub typ: PartitionType,
    pub end_chs: Chs,
    pub first_lba: u32,
    pub nsecs: u32,
}

impl PartitionEntry {
    pub const SZ: usize = 16;
}

impl<'a> TryFromCtx<'a, scroll::Endian> for PartitionEntry {
    type Error = scroll::Error;
    fn try_from_ctx(from: &'a [u8], _ctx: scroll::Endian) -> Result<(Self, usize), Self::Error> {
        let status: u8 = from.pread_with(0, LE)?;
        let typ: u8 = from.pread_with(4, LE)?;
        Ok((
            PartitionEntry {
                status: status.into(),
                start_chs: from.pread_with(1, LE)?,
                typ: typ.into(),
                end_chs: from.pread_with(5, LE)?,
                first_lba: from.pread_with(8, LE)?,
                nsecs: from.pread_with(12, LE)?,
            },
            Self::SZ,
        ))
    }
}

#[derive(Debug)]
pub struct Mbr {
    pub boot_code: [u8; 440], // `unused`
    pub disk_signature: u32,
    // 444..=445 reserved
    pub partitions: [PartitionEntry; 4],
    pub boot_sig: u16, // check only, 0xAA55
}

impl Mbr {
    pub const SZ: usize = 512;
    pub const BOOT_SIG: u16 = 0xAA55;
    const TABLE_OFFSET: usize = 446;

    /// Structural decode only; the boot signature is the one thing checked.
    pub fn new(buf: &[u8; 512]) -> Result<Self, Error> {
        let boot_sig: u16 = buf.pread_with(510, LE)?;
        if boot_sig != Self::BOOT_SIG {
            return Err(Error::InvalidSignature(boot_sig));
        }
        let entry = |i: usize| -> Result<PartitionEntry, scroll::Error> {
            buf.pread_with(Self::TABLE_OFFSET + i * PartitionEntry::SZ, LE)
        };
        Ok(Mbr {
            boot_code: buf.pread_with(0, LE)?,
            disk_signature: buf.pread_with(440, LE)?,
            partitions: [entry(0)?, entry(1)?, entry(2)?, entry(3)?],
            boot_sig,
        })
    }

    /// Table entries with their 1-based slot numbers, in disk order.
    pub fn partitions(&self) -> impl Iterator<Item = (usize, &PartitionEntry)> {
        self.partitions.iter().enumerate().map(|(i, p)| (i + 1, p))
    }

    pub fn used_partitions(&self) -> impl Iterator<Item = (usize, &PartitionEntry)> {
        self.partitions().filter(|(_, p)| p.typ.in_use())
    }
}
