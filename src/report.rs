use std::{
    fmt,
    io::{self, Write},
    os::unix::ffi::OsStrExt,
    path::Path,
};

use crate::layout::{DeviceIdentity, Mbr, PartitionEntry, PartitionStatus, PartitionType};

impl fmt::Display for PartitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bootable => "bootable",
            Self::NonBootable => "non-bootable",
            Self::BootableLba => "bootable lba",
            Self::NonBootableLba => "non-bootable lba",
            Self::Invalid(_) => "invalid partition status",
        })
    }
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unused => "unused",
            Self::Ntfs => "ntfs",
            Self::LinuxSwap => "linux-swap",
            Self::Linux => "linux",
            Self::Extended { .. } => "extended",
            Self::Unknown(_) => "unknown",
        })
    }
}

pub const OVERFLOW_NOTE: &str = " (size>8GB)";

/// Text block for one table slot, or `None` when the slot is unused.
pub fn partition_report(slot: usize, p: &PartitionEntry) -> Option<String> {
    if !p.typ.in_use() {
        return None;
    }
    let note = if p.end_chs.is_overflow_sentinel() {
        OVERFLOW_NOTE
    } else {
        ""
    };
    Some(format!(
        "Partition {}\n \
         - status: {}\n \
         - type: {}\n \
         - start chs: {}\n \
         - ending chs: {}{}\n \
         - first LBA sector: {}\n \
         - number of sectors: {}\n",
        slot, p.status, p.typ, p.start_chs, p.end_chs, note, p.first_lba, p.nsecs
    ))
}

pub fn write_device(w: &mut impl Write, path: &Path) -> io::Result<()> {
    w.write_all(b"DEVICE: ")?;
    w.write_all(path.as_os_str().as_bytes())?;
    w.write_all(b"\n")
}

/// Identity text fields go out byte for byte, padding and all.
pub fn write_identity(w: &mut impl Write, id: &DeviceIdentity) -> io::Result<()> {
    writeln!(w, "Sectors: {}", id.lba_capacity_2)?;
    for (label, field) in [
        ("Serial No: ", &id.serial_no[..]),
        ("Model: ", &id.model[..]),
        ("Firmware: ", &id.fw_rev[..]),
    ] {
        w.write_all(label.as_bytes())?;
        w.write_all(field)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

pub fn identity_report(path: &Path, id: &DeviceIdentity) -> Vec<u8> {
    let mut out = vec![];
    // writes into a Vec cannot fail
    let _ = write_device(&mut out, path).and_then(|_| write_identity(&mut out, id));
    out
}

pub fn write_partitions(w: &mut impl Write, mbr: &Mbr) -> io::Result<()> {
    for text in mbr
        .used_partitions()
        .filter_map(|(slot, p)| partition_report(slot, p))
    {
        w.write_all(text.as_bytes())?;
    }
    Ok(())
}
