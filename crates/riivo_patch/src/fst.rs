//! Virtual file system tree (FST) that patches are applied to.
//!
//! The tree is an owned hierarchy of [`FstNode`]s: a folder owns its children and a
//! file owns an ordered list of [`ContentSource`]s describing where each byte range of
//! the file comes from. Nothing is read while patching; the sources are only resolved
//! when the tree is [exported](crate::export) or read back with
//! [`FstNode::read_to_vec`].
//!
//! A file's sources are kept sorted by offset, contiguous and non-overlapping, and
//! together cover exactly `[0, size)`. [`FstNode::has_exact_coverage`] checks this.

use crate::host::HostFs;
use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// Where the bytes of a [`ContentSource`] come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOrigin {
    /// A region of the original disc volume, starting at `offset`.
    Volume { offset: u64 },
    /// A host file, starting at `offset` within it.
    External { path: Utf8PathBuf, offset: u64 },
    /// A run of a single repeated byte.
    Fill(u8),
}

impl ContentOrigin {
    /// The same origin with its read position moved `by` bytes forward.
    pub fn advanced(&self, by: u64) -> Self {
        match self {
            ContentOrigin::Volume { offset } => ContentOrigin::Volume {
                offset: offset + by,
            },
            ContentOrigin::External { path, offset } => ContentOrigin::External {
                path: path.clone(),
                offset: offset + by,
            },
            ContentOrigin::Fill(value) => ContentOrigin::Fill(*value),
        }
    }

    /// Fill `buf` with the bytes found `internal_offset` bytes into this origin.
    pub fn read(
        &self,
        volume: &dyn VolumeReader,
        host: &dyn HostFs,
        internal_offset: u64,
        buf: &mut [u8],
    ) -> io::Result<()> {
        match self {
            ContentOrigin::Volume { offset } => volume.read_at(offset + internal_offset, buf),
            ContentOrigin::External { path, offset } => {
                host.read_at(path, offset + internal_offset, buf)
            }
            ContentOrigin::Fill(value) => {
                buf.fill(*value);
                Ok(())
            }
        }
    }
}

/// One contiguous byte range of a virtual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSource {
    /// Offset of the range within the virtual file.
    pub offset: u64,
    /// Length of the range.
    pub size: u64,
    pub origin: ContentOrigin,
}

impl ContentSource {
    pub fn new(offset: u64, size: u64, origin: ContentOrigin) -> Self {
        Self {
            offset,
            size,
            origin,
        }
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// File content or folder children of an [`FstNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    File(Vec<ContentSource>),
    Folder(Vec<FstNode>),
}

/// A file or folder in the virtual tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstNode {
    pub filename: String,
    /// Declared size. Always 0 for folders.
    pub size: u64,
    pub content: NodeContent,
}

impl FstNode {
    /// An empty file.
    pub fn new_file(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            size: 0,
            content: NodeContent::File(Vec::new()),
        }
    }

    /// A file consisting of a single source that covers it entirely.
    pub fn with_source(filename: impl Into<String>, size: u64, origin: ContentOrigin) -> Self {
        let sources = if size == 0 {
            Vec::new()
        } else {
            vec![ContentSource::new(0, size, origin)]
        };
        Self {
            filename: filename.into(),
            size,
            content: NodeContent::File(sources),
        }
    }

    /// An empty folder.
    pub fn new_folder(filename: impl Into<String>) -> Self {
        Self::folder_with(filename, Vec::new())
    }

    /// A folder holding `children`.
    pub fn folder_with(filename: impl Into<String>, children: Vec<FstNode>) -> Self {
        Self {
            filename: filename.into(),
            size: 0,
            content: NodeContent::Folder(children),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.content, NodeContent::File(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.content, NodeContent::Folder(_))
    }

    /// Content sources of a file node.
    pub fn sources(&self) -> Option<&[ContentSource]> {
        match &self.content {
            NodeContent::File(sources) => Some(sources),
            NodeContent::Folder(_) => None,
        }
    }

    /// Children of a folder node.
    pub fn children(&self) -> Option<&[FstNode]> {
        match &self.content {
            NodeContent::Folder(children) => Some(children),
            NodeContent::File(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<FstNode>> {
        match &mut self.content {
            NodeContent::Folder(children) => Some(children),
            NodeContent::File(_) => None,
        }
    }

    /// Whether a file's sources are sorted, contiguous, non-empty ranges covering
    /// exactly `[0, size)`. Folders always pass.
    pub fn has_exact_coverage(&self) -> bool {
        let Some(sources) = self.sources() else {
            return true;
        };

        let mut expected = 0;
        for source in sources {
            if source.offset != expected || source.size == 0 {
                return false;
            }
            expected = source.end();
        }
        expected == self.size
    }

    /// Read the whole content of a file node.
    pub fn read_to_vec(&self, volume: &dyn VolumeReader, host: &dyn HostFs) -> io::Result<Vec<u8>> {
        let sources = self.sources().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is a folder", self.filename),
            )
        })?;

        let size = usize::try_from(self.size)
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "file too large"))?;
        let mut data = vec![0u8; size];
        for source in sources {
            let start = source.offset as usize;
            let end = source.end() as usize;
            source.origin.read(volume, host, 0, &mut data[start..end])?;
        }
        Ok(data)
    }
}

/// Random access to the original disc volume.
pub trait VolumeReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl VolumeReader for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| eof())?;
        let end = start.checked_add(buf.len()).ok_or_else(eof)?;
        let src = self.get(start..end).ok_or_else(eof)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

impl VolumeReader for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_at(offset, buf)
    }
}

/// Volume for trees that only reference host files and fills.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVolume;

impl VolumeReader for NoVolume {
    fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "tree has no backing volume",
        ))
    }
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of volume")
}

/// Build a tree mirroring a host directory.
///
/// Every host file becomes a file node backed by a single
/// [`External`](ContentOrigin::External) source. Used for extracted discs.
pub fn from_host_dir(host: &dyn HostFs, dir: &Utf8Path) -> io::Result<Vec<FstNode>> {
    let mut root = Vec::new();

    for entry in host.scan_dir(dir, true)? {
        let mut components: Vec<&str> = entry.relative_path.split('/').collect();
        let Some(name) = components.pop() else {
            continue;
        };

        let mut level = &mut root;
        for component in components {
            level = folder_children(level, component);
        }

        if entry.is_dir {
            folder_children(level, name);
        } else {
            let size = host.file_size(&entry.physical_path)?;
            level.push(FstNode::with_source(
                name,
                size,
                ContentOrigin::External {
                    path: entry.physical_path.clone(),
                    offset: 0,
                },
            ));
        }
    }

    Ok(root)
}

/// Children of the folder `name` in `level`, creating the folder when missing.
fn folder_children<'a>(level: &'a mut Vec<FstNode>, name: &str) -> &'a mut Vec<FstNode> {
    let found = level
        .iter()
        .position(|n| n.is_folder() && n.filename == name);
    let index = match found {
        Some(index) => index,
        None => {
            level.push(FstNode::new_folder(name));
            level.len() - 1
        }
    };

    match &mut level[index].content {
        NodeContent::Folder(children) => children,
        NodeContent::File(_) => unreachable!("position() only matches folders"),
    }
}
