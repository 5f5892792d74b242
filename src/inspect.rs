use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::device::{BlkDevice, Device};
use crate::layout::mbr::{self, Mbr};
use crate::report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Start,
    DeviceOpened,
    SectorRead,
    MbrValidated,
    IdentityFetched,
    PartitionsReported,
    Closed,
    // terminal failures
    OpenFailed,
    ReadFailed,
    SignatureInvalid,
    IdentityFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error opening device '{}': {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("error reading mbr from '{}': {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("no valid bootsector found on device '{}' (signature 0x{found:04X})", .path.display())]
    InvalidSignature { path: PathBuf, found: u16 },
    #[error("boot sector decode failed: {0}")]
    Decode(#[from] mbr::Error),
    #[error("ioctl error on '{}': {source}", .path.display())]
    Identity { path: PathBuf, source: io::Error },
    #[error("error writing report: {0}")]
    Output(#[source] io::Error),
}

impl Error {
    /// Terminal state the run stopped in.
    pub fn state(&self) -> State {
        match self {
            Self::Open { .. } => State::OpenFailed,
            Self::Read { .. } => State::ReadFailed,
            Self::InvalidSignature { .. } | Self::Decode(_) => State::SignatureInvalid,
            Self::Identity { .. } => State::IdentityFailed,
            // the report was under way when stdout went away
            Self::Output(_) => State::IdentityFetched,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Don't query the drive identity (plain image files have none).
    pub skip_identity: bool,
    /// Also print the disk signature.
    pub verbose: bool,
}

fn advance(state: &mut State, next: State) {
    debug!("[inspect] {:?} -> {:?}", state, next);
    *state = next;
}

/// Opens `path` and reports its boot sector to `out`.
pub fn inspect(path: &Path, opts: &Options, out: &mut impl Write) -> Result<State, Error> {
    let device = BlkDevice::open(path).map_err(|source| {
        debug!("[inspect] {:?} -> {:?}", State::Start, State::OpenFailed);
        Error::Open {
            path: path.to_path_buf(),
            source,
        }
    })?;
    run(path, device, opts, out)
}

/// Drives an already opened device through to `Closed`.
///
/// `device` is owned here and dropped exactly once, whichever way this returns.
/// Nothing is written to `out` unless the sector and identity were both obtained.
pub fn run<D: Device>(
    path: &Path,
    mut device: D,
    opts: &Options,
    out: &mut impl Write,
) -> Result<State, Error> {
    let mut state = State::Start;
    advance(&mut state, State::DeviceOpened);

    let sector = device.read_boot_sector().map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    });
    let sector = trace_err(&state, sector)?;
    advance(&mut state, State::SectorRead);

    let mbr = match Mbr::new(&sector) {
        Ok(mbr) => Ok(mbr),
        Err(mbr::Error::InvalidSignature(found)) => Err(Error::InvalidSignature {
            path: path.to_path_buf(),
            found,
        }),
        Err(err) => Err(err.into()),
    };
    let mbr = trace_err(&state, mbr)?;
    advance(&mut state, State::MbrValidated);

    let identity = if opts.skip_identity {
        info!("[inspect] identity query skipped for {}", path.display());
        None
    } else {
        let identity = device.identity().map_err(|source| Error::Identity {
            path: path.to_path_buf(),
            source,
        });
        Some(trace_err(&state, identity)?)
    };
    advance(&mut state, State::IdentityFetched);

    write_report(out, path, identity.as_ref(), &mbr, opts).map_err(Error::Output)?;
    advance(&mut state, State::PartitionsReported);

    drop(device);
    advance(&mut state, State::Closed);
    Ok(state)
}

fn trace_err<T>(state: &State, res: Result<T, Error>) -> Result<T, Error> {
    if let Err(err) = &res {
        debug!("[inspect] {:?} -> {:?}", state, err.state());
    }
    res
}

fn write_report(
    out: &mut impl Write,
    path: &Path,
    identity: Option<&crate::layout::DeviceIdentity>,
    mbr: &Mbr,
    opts: &Options,
) -> io::Result<()> {
    match identity {
        Some(id) => out.write_all(&report::identity_report(path, id))?,
        None => report::write_device(out, path)?,
    }
    if opts.verbose {
        writeln!(out, "Disk signature: 0x{:08X}", mbr.disk_signature)?;
    }
    report::write_partitions(out, mbr)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        io::{Cursor, Read, Seek, SeekFrom},
        rc::Rc,
    };

    use super::*;
    use crate::device::IdentityProvider;
    use crate::layout::mbr::tests::{raw_entry, sector_with};
    use crate::layout::DeviceIdentity;

    struct FakeDevice {
        data: Cursor<Vec<u8>>,
        identity: Option<DeviceIdentity>,
        identity_calls: Rc<Cell<usize>>,
        drops: Rc<Cell<usize>>,
    }

    impl FakeDevice {
        fn new(data: &[u8]) -> Self {
            FakeDevice {
                data: Cursor::new(data.to_vec()),
                identity: Some(DeviceIdentity {
                    serial_no: *b"WD-WCC4N1234567     ",
                    fw_rev: *b"82.00A82",
                    model: *b"WDC WD10EZEX-08WN4A0                    ",
                    lba_capacity_2: 1_953_525_168,
                }),
                identity_calls: Rc::default(),
                drops: Rc::default(),
            }
        }
    }

    impl Read for FakeDevice {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Seek for FakeDevice {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.data.seek(pos)
        }
    }

    impl IdentityProvider for FakeDevice {
        fn identity(&self) -> io::Result<DeviceIdentity> {
            self.identity_calls.set(self.identity_calls.get() + 1);
            self.identity
                .clone()
                .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOTTY))
        }
    }

    impl Drop for FakeDevice {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    const DEV: &str = "/dev/sdz";

    fn linux_entry(end: [u8; 3]) -> [u8; 16] {
        raw_entry(0x80, [0x20, 0x21, 0x00], 0x83, end, 2048, 204800)
    }

    fn run_fake(dev: FakeDevice, opts: &Options) -> (Result<State, Error>, Vec<u8>) {
        let mut out = vec![];
        let res = run(Path::new(DEV), dev, opts, &mut out);
        (res, out)
    }

    #[test]
    fn reports_single_linux_partition() {
        let dev = FakeDevice::new(&sector_with(&[linux_entry([0x8A, 0x08, 0x82])]));
        let drops = dev.drops.clone();

        let (res, out) = run_fake(dev, &Options::default());
        assert_eq!(res.unwrap(), State::Closed);
        assert_eq!(drops.get(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "DEVICE: /dev/sdz\n\
             Sectors: 1953525168\n\
             Serial No: WD-WCC4N1234567     \n\
             Model: WDC WD10EZEX-08WN4A0                    \n\
             Firmware: 82.00A82\n\
             Partition 1\n\
             \x20- status: bootable\n\
             \x20- type: linux\n\
             \x20- start chs: h:32 c:0 s:33\n\
             \x20- ending chs: h:138 c:130 s:8\n\
             \x20- first LBA sector: 2048\n\
             \x20- number of sectors: 204800\n"
        );
    }

    #[test]
    fn sentinel_end_is_annotated() {
        let dev = FakeDevice::new(&sector_with(&[linux_entry([0xFE, 0xFF, 0xFF])]));
        let (res, out) = run_fake(dev, &Options::default());
        assert!(res.is_ok());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(" - ending chs: h:254 c:1023 s:63 (size>8GB)\n"));
        assert!(text.contains(" - first LBA sector: 2048\n"));
    }

    #[test]
    fn all_unused_reports_identity_only() {
        let unused = raw_entry(0x80, [1, 2, 3], 0x00, [4, 5, 6], 2048, 204800);
        let dev = FakeDevice::new(&sector_with(&[unused; 4]));
        let (res, out) = run_fake(dev, &Options::default());
        assert_eq!(res.unwrap(), State::Closed);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("DEVICE: /dev/sdz\nSectors: 1953525168\n"));
        assert!(text.ends_with("Firmware: 82.00A82\n"));
        assert!(!text.contains("Partition"));
    }

    #[test]
    fn invalid_signature_releases_device_without_output() {
        let mut sector = sector_with(&[linux_entry([0, 0, 0])]);
        sector[511] = 0xAB;
        let dev = FakeDevice::new(&sector);
        let drops = dev.drops.clone();
        let calls = dev.identity_calls.clone();

        let (res, out) = run_fake(dev, &Options::default());
        let err = res.unwrap_err();
        assert!(matches!(err, Error::InvalidSignature { found: 0xAB55, .. }));
        assert_eq!(err.state(), State::SignatureInvalid);
        assert!(err.to_string().contains("'/dev/sdz'"));
        assert_eq!(drops.get(), 1);
        assert_eq!(calls.get(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn short_read_releases_device() {
        let dev = FakeDevice::new(&[0u8; 100]);
        let drops = dev.drops.clone();

        let (res, out) = run_fake(dev, &Options::default());
        let err = res.unwrap_err();
        assert_eq!(err.state(), State::ReadFailed);
        assert!(matches!(&err, Error::Read { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof));
        assert_eq!(drops.get(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn identity_failure_releases_device() {
        let mut dev = FakeDevice::new(&sector_with(&[linux_entry([0, 0, 0])]));
        dev.identity = None;
        let drops = dev.drops.clone();

        let (res, out) = run_fake(dev, &Options::default());
        let err = res.unwrap_err();
        assert_eq!(err.state(), State::IdentityFailed);
        assert!(err.to_string().starts_with("ioctl error on '/dev/sdz'"));
        assert_eq!(drops.get(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn skip_identity_never_queries() {
        let mut dev = FakeDevice::new(&sector_with(&[linux_entry([0, 0, 0])]));
        dev.identity = None;
        let calls = dev.identity_calls.clone();
        let opts = Options {
            skip_identity: true,
            ..Default::default()
        };

        let (res, out) = run_fake(dev, &opts);
        assert_eq!(res.unwrap(), State::Closed);
        assert_eq!(calls.get(), 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("DEVICE: /dev/sdz\nPartition 1\n"));
        assert!(!text.contains("Sectors:"));
    }

    #[test]
    fn verbose_prints_disk_signature() {
        let mut sector = sector_with(&[]);
        sector[440..444].copy_from_slice(&0x1234_ABCDu32.to_le_bytes());
        let opts = Options {
            verbose: true,
            ..Default::default()
        };
        let (res, out) = run_fake(FakeDevice::new(&sector), &opts);
        assert!(res.is_ok());
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("Firmware: 82.00A82\nDisk signature: 0x1234ABCD\n"));
    }

    #[test]
    fn missing_device_fails_to_open() {
        let mut out = vec![];
        let err = inspect(
            Path::new("/nonexistent/mbrinfo/sdz"),
            &Options::default(),
            &mut out,
        )
        .unwrap_err();
        assert_eq!(err.state(), State::OpenFailed);
        assert!(err
            .to_string()
            .starts_with("error opening device '/nonexistent/mbrinfo/sdz'"));
        assert!(out.is_empty());
    }
}
