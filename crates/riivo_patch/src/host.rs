//! Host filesystem access.
//!
//! The appliers never touch `std::fs` directly. They go through [`HostFs`] so that the
//! patch sources can live anywhere: a real SD card folder ([`LocalFs`]), an archive, or
//! an in-memory fixture.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use walkdir::WalkDir;

/// One entry found while scanning a host directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Path relative to the scanned directory, `/`-separated.
    pub relative_path: String,
    /// Full path on the host.
    pub physical_path: Utf8PathBuf,
    pub is_dir: bool,
}

impl HostEntry {
    /// The last component of the entry's path.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Read-only access to the files patches are sourced from.
pub trait HostFs {
    /// Size in bytes of the file at `path`.
    fn file_size(&self, path: &Utf8Path) -> io::Result<u64>;

    /// Read the whole file at `path`.
    fn read_file(&self, path: &Utf8Path) -> io::Result<Vec<u8>>;

    /// Read `buf.len()` bytes starting at `offset` of the file at `path`.
    fn read_at(&self, path: &Utf8Path, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// List the entries below `dir`. With `recursive` false only direct children are
    /// returned. The directory itself is never part of the result.
    fn scan_dir(&self, dir: &Utf8Path, recursive: bool) -> io::Result<Vec<HostEntry>>;
}

/// [`HostFs`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl HostFs for LocalFs {
    fn file_size(&self, path: &Utf8Path) -> io::Result<u64> {
        let metadata = std::fs::metadata(path.as_std_path())?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file: {}", path),
            ));
        }
        Ok(metadata.len())
    }

    fn read_file(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        std::fs::read(path.as_std_path())
    }

    fn read_at(&self, path: &Utf8Path, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = std::fs::File::open(path.as_std_path())?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn scan_dir(&self, dir: &Utf8Path, recursive: bool) -> io::Result<Vec<HostEntry>> {
        let mut walker = WalkDir::new(dir.as_std_path()).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let path = match Utf8PathBuf::from_path_buf(entry.path().to_path_buf()) {
                Ok(p) => p,
                Err(p) => {
                    tracing::warn!("Skipping non-UTF-8 path: {}", p.display());
                    continue;
                }
            };

            let relative_path = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join("/");

            entries.push(HostEntry {
                relative_path,
                physical_path: path,
                is_dir: entry.file_type().is_dir(),
            });
        }
        Ok(entries)
    }
}
