use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    os::unix::{fs::OpenOptionsExt, io::AsRawFd},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::layout::{DeviceIdentity, Mbr};

/// Anything the boot sector can be read from.
pub trait BlockSource {
    fn read_boot_sector(&mut self) -> io::Result<[u8; Mbr::SZ]>;
}

impl<T: Read + Seek> BlockSource for T {
    fn read_boot_sector(&mut self) -> io::Result<[u8; Mbr::SZ]> {
        let mut buf = [0u8; Mbr::SZ];
        self.seek(SeekFrom::Start(0))?;
        // short reads surface as UnexpectedEof
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

pub trait IdentityProvider {
    fn identity(&self) -> io::Result<DeviceIdentity>;
}

pub trait Device: BlockSource + IdentityProvider {}

impl<T: BlockSource + IdentityProvider> Device for T {}

#[cfg(target_os = "linux")]
const HDIO_GET_IDENTITY: libc::c_ulong = 0x030d;

/// A block device (or image file) opened read-only and non-blocking.
///
/// The descriptor is closed when this is dropped.
pub struct BlkDevice {
    file: File,
    path: PathBuf,
}

impl BlkDevice {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::options()
            .create(false)
            .write(false)
            .truncate(false)
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        debug!("[device] opened {}", path.display());
        Ok(BlkDevice {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Read for BlkDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for BlkDevice {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl IdentityProvider for BlkDevice {
    #[cfg(target_os = "linux")]
    fn identity(&self) -> io::Result<DeviceIdentity> {
        let mut buf = [0u8; DeviceIdentity::SZ];
        // SAFETY: HDIO_GET_IDENTITY writes at most sizeof(struct hd_driveid) == 512 bytes
        // into the buffer, and the descriptor stays open for the duration of the call.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                HDIO_GET_IDENTITY as _,
                buf.as_mut_ptr(),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        DeviceIdentity::new(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    #[cfg(not(target_os = "linux"))]
    fn identity(&self) -> io::Result<DeviceIdentity> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "HDIO_GET_IDENTITY is only available on linux",
        ))
    }
}

impl Drop for BlkDevice {
    fn drop(&mut self) {
        debug!("[device] released {}", self.path.display());
    }
}
