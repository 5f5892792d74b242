// References:
// [1] linux/hdreg.h, struct hd_driveid
// [2] ATA/ATAPI Command Set, IDENTIFY DEVICE data

use scroll::{Pread, LE};

/// Identity record as filled in by `HDIO_GET_IDENTITY`.
///
/// Text fields are kept exactly as the drive reports them: space padded,
/// byte-swapped ASCII on most hardware, possibly with stray control bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub serial_no: [u8; 20],
    pub fw_rev: [u8; 8],
    pub model: [u8; 40],
    pub lba_capacity_2: u64, // total user addressable sectors (48-bit)
}

impl DeviceIdentity {
    pub const SZ: usize = 512;

    pub fn new(buf: &[u8; 512]) -> Result<Self, scroll::Error> {
        Ok(DeviceIdentity {
            serial_no: buf.pread_with(20, LE)?,
            fw_rev: buf.pread_with(46, LE)?,
            model: buf.pread_with(54, LE)?,
            lba_capacity_2: buf.pread_with(200, LE)?,
        })
    }
}
