//! Virtual file system
//!
//! Paths starting with `/vsimem/` refer to in-process memory files, every other
//! path is a regular file on disk. Drivers only ever see a [`VsiFile`], so both
//! kinds of storage are interchangeable.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;

use crate::errors::{GdalError, Result};

const MEM_ROOT: &str = "/vsimem";

type MemBuffer = Arc<Mutex<Vec<u8>>>;

static MEM_FILES: Lazy<Mutex<HashMap<PathBuf, MemBuffer>>> = Lazy::new(Default::default);

fn mem_files() -> MutexGuard<'static, HashMap<PathBuf, MemBuffer>> {
    MEM_FILES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_buffer(buffer: &MemBuffer) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns `true` if `path` names an in-memory file.
pub fn is_mem_path<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    path.starts_with(MEM_ROOT) && path != Path::new(MEM_ROOT)
}

/// Creates a new in-memory file from a given buffer, replacing any existing one.
pub fn create_mem_file<P: AsRef<Path>>(file_name: P, data: Vec<u8>) -> Result<()> {
    _create_mem_file(file_name.as_ref(), data)
}

fn _create_mem_file(file_name: &Path, data: Vec<u8>) -> Result<()> {
    if !is_mem_path(file_name) {
        return Err(GdalError::BadArgument(format!(
            "'{}' is not a {MEM_ROOT}/ path",
            file_name.display()
        )));
    }
    mem_files().insert(file_name.to_path_buf(), Arc::new(Mutex::new(data)));
    Ok(())
}

/// Unlink an in-memory file.
///
/// Handles that are still open keep their data alive until they are dropped.
pub fn unlink_mem_file<P: AsRef<Path>>(file_name: P) -> Result<()> {
    _unlink_mem_file(file_name.as_ref())
}

fn _unlink_mem_file(file_name: &Path) -> Result<()> {
    match mem_files().remove(file_name) {
        Some(_) => Ok(()),
        None => Err(GdalError::UnlinkMemFile {
            file_name: file_name.display().to_string(),
        }),
    }
}

/// Copies the bytes of the in-memory file with given `file_name` and unlinks it.
pub fn get_vsi_mem_file_bytes_owned<P: AsRef<Path>>(file_name: P) -> Result<Vec<u8>> {
    let file_name = file_name.as_ref();
    let buffer = mem_files()
        .remove(file_name)
        .ok_or_else(|| not_found(file_name))?;
    let bytes = match Arc::try_unwrap(buffer) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(|p| p.into_inner()),
        Err(shared) => lock_buffer(&shared).clone(),
    };
    Ok(bytes)
}

/// Computes a function on the bytes of the in-memory file with given `file_name`.
/// This method is useful if you don't want to take the ownership of the memory.
pub fn call_on_mem_file_bytes<F, R, P: AsRef<Path>>(file_name: P, fun: F) -> Result<R>
where
    F: FnOnce(&[u8]) -> R,
{
    let file_name = file_name.as_ref();
    let buffer = mem_files()
        .get(file_name)
        .cloned()
        .ok_or_else(|| not_found(file_name))?;
    let data = lock_buffer(&buffer);
    Ok(fun(&data))
}

fn not_found(path: &Path) -> GdalError {
    GdalError::OpenFailed {
        path: path.display().to_string(),
        msg: "No such file or directory".to_string(),
    }
}

/// Returns `true` if the file exists.
pub fn exists<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    if is_mem_path(path) {
        mem_files().contains_key(path)
    } else {
        path.is_file()
    }
}

/// Opens an existing file for reading.
pub fn open<P: AsRef<Path>>(path: P) -> Result<VsiFile> {
    open_with(path.as_ref(), false)
}

/// Opens an existing file for reading and writing.
pub fn open_update<P: AsRef<Path>>(path: P) -> Result<VsiFile> {
    open_with(path.as_ref(), true)
}

fn open_with(path: &Path, writable: bool) -> Result<VsiFile> {
    if is_mem_path(path) {
        let data = mem_files()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))?;
        return Ok(VsiFile::Mem(MemFile {
            data,
            pos: 0,
            writable,
        }));
    }
    let file = OpenOptions::new()
        .read(true)
        .write(writable)
        .open(path)
        .map_err(|e| GdalError::OpenFailed {
            path: path.display().to_string(),
            msg: e.to_string(),
        })?;
    Ok(VsiFile::Disk(file))
}

/// Creates (or truncates) a file and opens it for reading and writing.
pub fn create<P: AsRef<Path>>(path: P) -> Result<VsiFile> {
    let path = path.as_ref();
    if is_mem_path(path) {
        let data: MemBuffer = Arc::new(Mutex::new(Vec::new()));
        mem_files().insert(path.to_path_buf(), data.clone());
        return Ok(VsiFile::Mem(MemFile {
            data,
            pos: 0,
            writable: true,
        }));
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| GdalError::OpenFailed {
            path: path.display().to_string(),
            msg: e.to_string(),
        })?;
    Ok(VsiFile::Disk(file))
}

/// Reads up to `len` bytes from the start of `path`.
///
/// Used by drivers to identify a file before committing to open it.
pub fn read_header_bytes<P: AsRef<Path>>(path: P, len: usize) -> Result<Vec<u8>> {
    let mut file = open(path)?;
    let mut header = Vec::with_capacity(len);
    (&mut file).take(len as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// Handle on an in-memory file.
#[derive(Debug)]
pub struct MemFile {
    data: MemBuffer,
    pos: u64,
    writable: bool,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = lock_buffer(&self.data);
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "in-memory file opened read-only",
            ));
        }
        let mut data = lock_buffer(&self.data);
        let start = self.pos as usize;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = lock_buffer(&self.data).len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => len + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of in-memory file",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// A file handle returned by [`open`], [`open_update`] or [`create`].
#[derive(Debug)]
pub enum VsiFile {
    Disk(File),
    Mem(MemFile),
}

impl Read for VsiFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            VsiFile::Disk(f) => f.read(buf),
            VsiFile::Mem(f) => f.read(buf),
        }
    }
}

impl Write for VsiFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            VsiFile::Disk(f) => f.write(buf),
            VsiFile::Mem(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            VsiFile::Disk(f) => f.flush(),
            VsiFile::Mem(f) => f.flush(),
        }
    }
}

impl Seek for VsiFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            VsiFile::Disk(f) => f.seek(pos),
            VsiFile::Mem(f) => f.seek(pos),
        }
    }
}

/// A readable byte stream that can be rewound to its first byte.
///
/// This is all a forward-only decoder needs from its input: no general seeking.
pub trait ByteSource: Read + Send {
    fn seek_to_start(&mut self) -> io::Result<()>;
}

impl<T: Read + Seek + Send> ByteSource for T {
    fn seek_to_start(&mut self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_retrieve_mem_file() {
        let file_name = "/vsimem/525ebf24-a030-4677-bb4e-a921741cabe0";

        create_mem_file(file_name, vec![1_u8, 2, 3, 4]).unwrap();

        let bytes = get_vsi_mem_file_bytes_owned(file_name).unwrap();

        assert_eq!(bytes, vec![1_u8, 2, 3, 4]);

        // mem file must not be there anymore
        assert!(matches!(
            unlink_mem_file(file_name),
            Err(GdalError::UnlinkMemFile { file_name: f }) if f == file_name
        ));
    }

    #[test]
    fn create_and_callmem_file() {
        let file_name = "/vsimem/ee08caf2-a510-4b21-a4c4-44c1ebd763c8";

        create_mem_file(file_name, vec![1_u8, 2, 3, 4]).unwrap();

        let result = call_on_mem_file_bytes(file_name, |bytes| {
            bytes.iter().map(|b| b * 2).collect::<Vec<u8>>()
        })
        .unwrap();

        assert_eq!(result, vec![2_u8, 4, 6, 8]);

        unlink_mem_file(file_name).unwrap();
    }

    #[test]
    fn no_mem_file() {
        assert!(matches!(
            get_vsi_mem_file_bytes_owned("/vsimem/foobar"),
            Err(GdalError::OpenFailed { .. })
        ));
    }

    #[test]
    fn unable_to_create() {
        let file_name = "";

        assert!(matches!(
            create_mem_file(file_name, vec![1_u8, 2, 3, 4]),
            Err(GdalError::BadArgument(_))
        ));

        assert!(matches!(
            unlink_mem_file(file_name),
            Err(GdalError::UnlinkMemFile { .. })
        ));
    }

    #[test]
    fn write_seek_read() {
        let file_name = "/vsimem/2f0cbd43-8c3c-4d8a-9b64-1f1e0a1b7c5e";

        let mut f = create(file_name).unwrap();
        f.write_all(b"ENVI").unwrap();
        f.seek(SeekFrom::Start(6)).unwrap();
        f.write_all(b"!").unwrap();
        f.seek_to_start().unwrap();

        let mut content = Vec::new();
        f.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"ENVI\0\0!");

        assert!(exists(file_name));
        assert_eq!(read_header_bytes(file_name, 2).unwrap(), b"EN");

        let mut ro = open(file_name).unwrap();
        assert!(ro.write_all(b"x").is_err());

        unlink_mem_file(file_name).unwrap();
        assert!(!exists(file_name));
    }
}
