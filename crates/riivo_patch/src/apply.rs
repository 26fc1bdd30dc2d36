//! Applies the disc side of a [`Patch`] to a virtual tree.
//!
//! `<file>` entries address one disc path. `<folder>` entries scan a host directory
//! and patch one disc file per host file, either below a disc folder or, when the
//! folder entry has no disc path, every file in the tree sharing the host file's name.
//!
//! Disc names are matched ASCII case-insensitively. An entry whose path cannot be
//! resolved (missing with `create` unset, or a file/folder kind clash) is skipped and
//! the remaining entries still apply.

use crate::fst::FstNode;
use crate::host::HostFs;
use crate::model::{File, Folder, Patch};
use crate::overlay::{apply_content_patch, ContentPatch};

/// Disc path of the main executable in `<file>` entries.
pub const DOL_PATH: &str = "main.dol";

/// Counts of what a patch pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// File nodes that received a content patch.
    pub patched: usize,
    /// Entries (or per-file folder matches) that could not be applied.
    pub skipped: usize,
}

impl ApplyStats {
    fn record(&mut self, applied: bool) {
        if applied {
            self.patched += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Resolve `path` below `nodes`, optionally creating missing nodes.
///
/// The last component names a file when `want_folder` is false and a folder when it is
/// true. Intermediate components always name folders. With `create` set, missing
/// nodes (including intermediate folders) are appended; otherwise a missing node
/// fails the lookup. A node of the wrong kind always fails the lookup.
pub fn find_or_create<'a>(
    nodes: &'a mut Vec<FstNode>,
    path: &str,
    create: bool,
    want_folder: bool,
) -> Option<&'a mut FstNode> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return None;
    }

    let (name, rest) = match path.split_once('/') {
        Some((name, rest)) if !rest.trim_start_matches('/').is_empty() => (name, Some(rest)),
        Some((name, _)) => (name, None),
        None => (path, None),
    };
    let is_last = rest.is_none();
    let folder_expected = !is_last || want_folder;

    let found = nodes
        .iter()
        .position(|n| n.filename.eq_ignore_ascii_case(name));
    let index = match found {
        Some(index) => index,
        None if create => {
            tracing::debug!("Creating disc {} '{}'", kind(folder_expected), name);
            nodes.push(if folder_expected {
                FstNode::new_folder(name)
            } else {
                FstNode::new_file(name)
            });
            nodes.len() - 1
        }
        None => {
            tracing::debug!("Disc path component '{}' not found", name);
            return None;
        }
    };

    let node = &mut nodes[index];
    if node.is_folder() != folder_expected {
        tracing::debug!(
            "Disc path component '{}' is a {}, expected a {}",
            name,
            kind(node.is_folder()),
            kind(folder_expected)
        );
        return None;
    }

    match rest {
        None => Some(node),
        Some(rest) => find_or_create(node.children_mut()?, rest, create, want_folder),
    }
}

fn kind(folder: bool) -> &'static str {
    if folder {
        "folder"
    } else {
        "file"
    }
}

/// Collect every file node anywhere below `nodes` whose name is `filename`.
pub fn find_all_named<'a>(nodes: &'a mut [FstNode], filename: &str) -> Vec<&'a mut FstNode> {
    let mut found = Vec::new();
    collect_named(nodes, filename, &mut found);
    found
}

fn collect_named<'a>(nodes: &'a mut [FstNode], filename: &str, found: &mut Vec<&'a mut FstNode>) {
    for node in nodes {
        if node.is_file() {
            if node.filename.eq_ignore_ascii_case(filename) {
                found.push(node);
            }
        } else if let Some(children) = node.children_mut() {
            collect_named(children, filename, found);
        }
    }
}

/// Apply the `<file>` and `<folder>` entries of `patch` to a tree, in document order.
pub fn apply_patch_to_fst(host: &dyn HostFs, patch: &Patch, fst: &mut Vec<FstNode>) -> ApplyStats {
    let mut stats = ApplyStats::default();

    for file in &patch.file_patches {
        stats.record(apply_file_patch(host, patch, file, fst));
    }
    for folder in &patch.folder_patches {
        apply_folder_patch(host, patch, folder, fst, &mut stats);
    }

    tracing::info!(
        "Patch '{}': {} file(s) patched, {} skipped",
        patch.id,
        stats.patched,
        stats.skipped
    );
    stats
}

/// Apply the `<file>` entries of `patch` that target the main executable to `dol`.
///
/// The executable is not part of the file tree, so its node is handed in separately.
pub fn apply_patch_to_dol(host: &dyn HostFs, patch: &Patch, dol: &mut FstNode) -> ApplyStats {
    let mut stats = ApplyStats::default();

    for file in patch
        .file_patches
        .iter()
        .filter(|f| f.disc.trim_start_matches('/').eq_ignore_ascii_case(DOL_PATH))
    {
        let external = patch.resolve_external(&file.external);
        stats.record(apply_content_patch(host, dol, &file_content(file, &external)));
    }

    stats
}

fn file_content<'a>(file: &File, external: &'a camino::Utf8Path) -> ContentPatch<'a> {
    ContentPatch {
        external,
        external_offset: u64::from(file.file_offset),
        offset: u64::from(file.offset),
        length: u64::from(file.length),
        resize: file.resize,
    }
}

fn apply_file_patch(host: &dyn HostFs, patch: &Patch, file: &File, fst: &mut Vec<FstNode>) -> bool {
    let Some(node) = find_or_create(fst, &file.disc, file.create, false) else {
        tracing::warn!("Skipping file patch: disc path '{}' not found", file.disc);
        return false;
    };

    let external = patch.resolve_external(&file.external);
    apply_content_patch(host, node, &file_content(file, &external))
}

fn apply_folder_patch(
    host: &dyn HostFs,
    patch: &Patch,
    folder: &Folder,
    fst: &mut Vec<FstNode>,
    stats: &mut ApplyStats,
) {
    let external_dir = patch.resolve_external(&folder.external);
    let entries = match host.scan_dir(&external_dir, folder.recursive) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                "Skipping folder patch: cannot scan '{}': {}",
                external_dir,
                e
            );
            stats.skipped += 1;
            return;
        }
    };

    let wildcard = folder.disc.is_empty();
    let disc_dir = folder.disc.trim_matches('/');
    for entry in entries.iter().filter(|e| !e.is_dir) {
        let content = ContentPatch {
            external: &entry.physical_path,
            external_offset: 0,
            offset: 0,
            length: u64::from(folder.length),
            resize: folder.resize,
        };

        if wildcard {
            let matches = find_all_named(fst, entry.file_name());
            if matches.is_empty() {
                tracing::debug!("No disc file named '{}'", entry.file_name());
            }
            for node in matches {
                stats.record(apply_content_patch(host, node, &content));
            }
        } else {
            let disc_path = if disc_dir.is_empty() {
                entry.relative_path.to_string()
            } else {
                format!("{}/{}", disc_dir, entry.relative_path)
            };
            match find_or_create(fst, &disc_path, folder.create, false) {
                Some(node) => stats.record(apply_content_patch(host, node, &content)),
                None => {
                    tracing::warn!("Skipping folder patch file: disc path '{}' not found", disc_path);
                    stats.skipped += 1;
                }
            }
        }
    }
}
