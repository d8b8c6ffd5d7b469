//! Memory-mapped file access for table files

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut, MmapOptions};

use datalab_core::{Error, Result};

/// Read-only memory map of a table file
pub struct MemoryMappedFile {
    /// The memory map
    mmap: Mmap,

    /// The path to the file
    path: PathBuf,
}

impl MemoryMappedFile {
    /// Open a file for memory-mapped reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        // SAFETY: table files are replaced by rename, never truncated in place,
        // so the mapped pages stay valid for the lifetime of the map.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(Self { mmap, path })
    }

    /// The mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// Get the path to the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file in bytes
    pub fn size(&self) -> usize {
        self.mmap.len()
    }
}

/// Writable memory map sized once at creation
pub struct MemoryMappedFileMut {
    mmap: MmapMut,
    cursor: usize,
}

impl MemoryMappedFileMut {
    /// Create (or truncate) `path` and size it to exactly `size` bytes
    pub fn create(path: &Path, size: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size as u64)?;

        // SAFETY: the file was created by this process under a unique name and
        // is not visible to readers until it is renamed into place.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        Ok(Self { mmap, cursor: 0 })
    }

    /// Copy `bytes` at the current position and advance it
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let end = self.cursor + bytes.len();
        if end > self.mmap.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("write of {} bytes past end of {}-byte map", bytes.len(), self.mmap.len()),
            ));
        }
        self.mmap[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        Ok(())
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Flush changes to disk
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}

/// Bytes written to a hidden sibling of their target and not yet visible.
///
/// [`StagedFile::commit`] renames the sibling over the target. Dropping an
/// uncommitted file removes the sibling and leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
    len: u64,
    committed: bool,
}

impl StagedFile {
    /// File the bytes will replace
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Number of staged bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether no bytes were staged
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move the staged bytes into place
    pub fn commit(mut self) -> Result<u64> {
        fs::rename(&self.temp, &self.target)
            .map_err(|source| Error::persistence(&self.target, source))?;
        self.committed = true;
        Ok(self.len)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Write `parts` back to back into a sibling of `path` sized to the exact
/// total, without touching `path` itself.
///
/// A `path` that is a directory is rejected here, so that a later
/// [`StagedFile::commit`] only fails on an unexpected rename error.
pub fn stage_file(path: &Path, parts: &[&[u8]]) -> Result<StagedFile> {
    if path.is_dir() {
        return Err(Error::persistence(
            path,
            io::Error::other("target is a directory"),
        ));
    }

    let total: usize = parts.iter().map(|part| part.len()).sum();
    let staged = StagedFile {
        temp: temp_sibling(path),
        target: path.to_path_buf(),
        len: total as u64,
        committed: false,
    };

    fill(&staged.temp, total, parts).map_err(|source| Error::persistence(path, source))?;
    Ok(staged)
}

/// Write `parts` back to back into `path`, replacing it atomically.
///
/// Readers observe either the old file or the complete new one. Any failure
/// leaves `path` untouched and is reported as [`Error::Persistence`].
pub fn write_atomic(path: &Path, parts: &[&[u8]]) -> Result<u64> {
    stage_file(path, parts)?.commit()
}

fn fill(temp: &Path, total: usize, parts: &[&[u8]]) -> io::Result<()> {
    if total == 0 {
        // zero-length maps are rejected on some platforms
        File::create(temp)?;
        return Ok(());
    }

    let mut map = MemoryMappedFileMut::create(temp, total)?;
    for part in parts {
        map.write_all(part)?;
    }
    debug_assert_eq!(map.position(), total);
    map.flush()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
}
