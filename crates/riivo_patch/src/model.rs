//! In-memory patch model produced by the [parser](crate::parser).
//!
//! A [`Disc`] is one parsed patch document. It holds an ordered list of [`Patch`]
//! groups; document order is application order, so a later patch may overwrite bytes
//! written by an earlier one. The model is plain data and is never mutated by the
//! appliers.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

/// Replaces, adds, or modifies a file on disc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct File {
    /// Path of the file on disc to modify.
    pub disc: String,
    /// Path of the host file providing the new bytes, relative to the patch root.
    pub external: String,
    /// Truncate the disc file where the patched range ends. When false, bytes after
    /// the patched range keep their previous content.
    pub resize: bool,
    /// Create the disc file if it does not exist. Otherwise the entry is skipped.
    pub create: bool,
    /// Offset in the disc file where replacement starts.
    pub offset: u32,
    /// Offset in the external file where the copied bytes start.
    pub file_offset: u32,
    /// Number of bytes to copy; 0 copies the whole external file. Bytes past the end
    /// of the external file are zero-filled.
    pub length: u32,
}

impl Default for File {
    fn default() -> Self {
        Self {
            disc: String::new(),
            external: String::new(),
            resize: true,
            create: false,
            offset: 0,
            file_offset: 0,
            length: 0,
        }
    }
}

/// Adds or modifies every file of a host folder on disc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    /// Disc folder to patch. Empty means "match each external file by name anywhere
    /// in the tree".
    pub disc: String,
    /// Host folder providing the files, relative to the patch root.
    pub external: String,
    /// Like [`File::resize`], for each file.
    pub resize: bool,
    /// Like [`File::create`], for each file.
    pub create: bool,
    /// Whether subdirectories of the external folder are scanned too.
    pub recursive: bool,
    /// Like [`File::length`], for each file.
    pub length: u32,
}

impl Default for Folder {
    fn default() -> Self {
        Self {
            disc: String::new(),
            external: String::new(),
            resize: true,
            create: false,
            recursive: true,
            length: 0,
        }
    }
}

/// Redirects save data to a host folder. Parsed only; redirection happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Savegame {
    /// Host folder to keep the save files in.
    pub external: String,
    /// Copy the existing save into an empty external folder on boot.
    pub clone: bool,
}

impl Default for Savegame {
    fn default() -> Self {
        Self {
            external: String::new(),
            clone: true,
        }
    }
}

/// Modifies guest RAM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Memory {
    /// Guest address the write starts at.
    pub offset: u32,
    /// Bytes to write.
    pub value: Vec<u8>,
    /// Host file to read the bytes from instead of `value`, relative to the patch root.
    pub value_file: String,
    /// When non-empty, the write only happens if memory currently holds these bytes.
    pub original: Vec<u8>,
    /// Ocarina-style patch. Not supported; such entries are skipped.
    pub ocarina: bool,
    /// Search memory for `original` instead of using `offset`. Not supported; such
    /// entries are skipped.
    pub search: bool,
    /// Search stride for `search` patches.
    pub align: u32,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            offset: 0,
            value: Vec::new(),
            value_file: String::new(),
            original: Vec::new(),
            ocarina: false,
            search: false,
            align: 1,
        }
    }
}

impl Memory {
    /// Whether this entry uses a variant the appliers do not implement.
    pub fn is_unsupported(&self) -> bool {
        self.ocarina || self.search
    }
}

/// A named group of modifications sharing a root path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Patch {
    /// Document-internal name of this patch.
    pub id: String,
    /// Base path all external paths of this patch are relative to.
    pub root: Utf8PathBuf,
    pub file_patches: Vec<File>,
    pub folder_patches: Vec<Folder>,
    pub savegame_patches: Vec<Savegame>,
    pub memory_patches: Vec<Memory>,
}

impl Patch {
    /// Resolve an external path of this patch against its root.
    pub fn resolve_external(&self, path: &str) -> Utf8PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Whether this patch contains no disc or memory modifications.
    pub fn is_empty(&self) -> bool {
        self.file_patches.is_empty()
            && self.folder_patches.is_empty()
            && self.memory_patches.is_empty()
    }
}

/// One parsed patch document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disc {
    /// Document format version. Only `1` is accepted by the parser.
    pub version: i64,
    /// Default root for patches that declare none.
    pub root: String,
    /// Patches in document order.
    pub patches: Vec<Patch>,
}

impl Disc {
    /// Find a patch by id.
    pub fn patch(&self, id: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id == id)
    }

    /// Produce application-ready patches with their roots resolved against `sd_root`.
    ///
    /// Each patch root becomes `sd_root / root`, where `root` is the patch's own root or
    /// the document default when the patch declares none. With an empty `selected` list
    /// every patch is returned; otherwise only the selected ids are, still in document
    /// order.
    pub fn generate_patches<S: AsRef<str>>(&self, sd_root: &Utf8Path, selected: &[S]) -> Vec<Patch> {
        self.patches
            .iter()
            .filter(|patch| selected.is_empty() || selected.iter().any(|s| s.as_ref() == patch.id))
            .map(|patch| {
                let root = if patch.root.as_str().is_empty() {
                    self.root.as_str()
                } else {
                    patch.root.as_str()
                };
                Patch {
                    root: sd_root.join(root.trim_start_matches('/')),
                    ..patch.clone()
                }
            })
            .collect()
    }
}
