//! Portable file-identity accessors.
//!
//! The source adapter needs a stable identity for an open file (device +
//! inode on Unix, volume serial + file index on Windows) to tell a rotated
//! file apart from the one it replaced, independent of path.
//!
//! FIXME: `std::os::windows::fs::MetadataExt::{volume_serial_number,
//! file_index}` are gated behind the unstable `windows_by_handle` feature
//! (<https://github.com/rust-lang/rust/issues/63010>) and are not callable on
//! stable Rust. Cribbed from the Rust stdlib and ported to work with winapi,
//! same as `file-source`'s own `metadata_ext.rs`.

use std::fs::File;
use std::io;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

#[cfg(windows)]
use std::{mem::zeroed, os::windows::io::AsRawHandle};

#[cfg(windows)]
use winapi::um::fileapi::{GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION};

pub trait PortableFileExt {
    fn portable_dev(&self) -> io::Result<u64>;
    fn portable_ino(&self) -> io::Result<u64>;
}

#[cfg(unix)]
impl PortableFileExt for File {
    fn portable_dev(&self) -> io::Result<u64> {
        Ok(self.metadata()?.dev())
    }

    fn portable_ino(&self) -> io::Result<u64> {
        Ok(self.metadata()?.ino())
    }
}

#[cfg(windows)]
impl PortableFileExt for File {
    fn portable_dev(&self) -> io::Result<u64> {
        let info = get_file_info(self)?;
        Ok(info.dwVolumeSerialNumber.into())
    }

    // Not exactly an inode, but the closest stable-API analogue: see
    // https://learn.microsoft.com/en-us/windows/win32/api/fileapi/ns-fileapi-by_handle_file_information
    fn portable_ino(&self) -> io::Result<u64> {
        let info = get_file_info(self)?;
        Ok((info.nFileIndexLow as u64) | ((info.nFileIndexHigh as u64) << 32))
    }
}

#[cfg(windows)]
fn get_file_info(file: &File) -> io::Result<BY_HANDLE_FILE_INFORMATION> {
    unsafe {
        let mut info: BY_HANDLE_FILE_INFORMATION = zeroed();
        if GetFileInformationByHandle(file.as_raw_handle(), &mut info) == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(info)
    }
}
