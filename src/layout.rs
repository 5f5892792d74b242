pub mod chs;
pub mod hdreg;
pub mod mbr;

pub use chs::Chs;
pub use hdreg::DeviceIdentity;
pub use mbr::{Mbr, PartitionEntry, PartitionStatus, PartitionType};
