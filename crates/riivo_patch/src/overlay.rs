//! Content overlay engine.
//!
//! Splices one byte-range replacement into a file node's [`ContentSource`] list:
//!
//! 1. The external file is sized; if it cannot be opened the node is left untouched.
//! 2. `patch_size` is `length`, or the external bytes available when `length` is 0, and
//!    the patch covers `[offset, offset + patch_size)`.
//! 3. A patch starting at or past the current end appends sources, with a zero fill
//!    bridging any gap.
//! 4. A patch touching existing data splits the sources straddling its boundaries,
//!    drops everything it covers and inserts its own sources in their place.
//! 5. When `resize` is set the file ends where the patch ends; otherwise the file only
//!    ever grows. Sources starting past the new end are dropped.
//!
//! Bytes requested past the end of the external file are zero-filled.

use crate::fst::{ContentOrigin, ContentSource, FstNode, NodeContent};
use crate::host::HostFs;
use camino::Utf8Path;

/// A single byte-range replacement.
#[derive(Debug, Clone, Copy)]
pub struct ContentPatch<'a> {
    /// Host file providing the bytes.
    pub external: &'a Utf8Path,
    /// Where in the external file the copied bytes start.
    pub external_offset: u64,
    /// Where in the target file the bytes go.
    pub offset: u64,
    /// Number of bytes; 0 means everything from `external_offset` to the end.
    pub length: u64,
    /// End the target file where the patch ends.
    pub resize: bool,
}

/// Apply `patch` to a file node. Returns whether the node was modified.
///
/// Folders and unreadable external files leave the node unchanged.
pub fn apply_content_patch(host: &dyn HostFs, node: &mut FstNode, patch: &ContentPatch) -> bool {
    let NodeContent::File(sources) = &mut node.content else {
        tracing::warn!("Cannot apply content patch to folder '{}'", node.filename);
        return false;
    };

    let external_size = match host.file_size(patch.external) {
        Ok(size) => size,
        Err(e) => {
            tracing::warn!(
                "Skipping patch of '{}': cannot open '{}': {}",
                node.filename,
                patch.external,
                e
            );
            return false;
        }
    };

    let available = external_size.saturating_sub(patch.external_offset);
    let patch_size = if patch.length == 0 {
        available
    } else {
        patch.length
    };
    let patch_start = patch.offset;
    let patch_end = patch_start + patch_size;
    let target_size = if patch.resize {
        patch_end
    } else {
        node.size.max(patch_end)
    };

    let new_sources = patch_sources(patch, patch_size, available);

    if patch_start >= node.size {
        if patch_start > node.size {
            sources.push(ContentSource::new(
                node.size,
                patch_start - node.size,
                ContentOrigin::Fill(0),
            ));
        }
        sources.extend(new_sources);
    } else {
        split_at(sources, patch_start);
        split_at(sources, patch_end);

        let first = sources.partition_point(|s| s.offset < patch_start);
        let last = first + sources[first..].partition_point(|s| s.end() <= patch_end);
        sources.splice(first..last, new_sources);
    }

    node.size = target_size;
    while sources.last().is_some_and(|s| s.offset >= target_size) {
        sources.pop();
    }

    tracing::debug!(
        "Patched '{}' [{:#x}, {:#x}) from '{}', size now {:#x}",
        node.filename,
        patch_start,
        patch_end,
        patch.external,
        target_size
    );
    debug_assert!(node.has_exact_coverage());

    true
}

/// Sources for the patched range itself, starting at `patch.offset`: the external data
/// and a zero fill for whatever the external file cannot supply.
fn patch_sources(patch: &ContentPatch, patch_size: u64, available: u64) -> Vec<ContentSource> {
    let data_size = patch_size.min(available);
    let mut sources = Vec::with_capacity(2);

    if data_size > 0 {
        sources.push(ContentSource::new(
            patch.offset,
            data_size,
            ContentOrigin::External {
                path: patch.external.to_path_buf(),
                offset: patch.external_offset,
            },
        ));
    }
    if patch_size > data_size {
        sources.push(ContentSource::new(
            patch.offset + data_size,
            patch_size - data_size,
            ContentOrigin::Fill(0),
        ));
    }
    sources
}

/// Split the source strictly containing `position` into two contiguous sources.
fn split_at(sources: &mut Vec<ContentSource>, position: u64) {
    let Some(index) = sources
        .iter()
        .position(|s| s.offset < position && position < s.end())
    else {
        return;
    };

    let source = &mut sources[index];
    let front = position - source.offset;
    let back = ContentSource::new(position, source.size - front, source.origin.advanced(front));
    source.size = front;
    sources.insert(index + 1, back);
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::tempdir;

    use crate::host::LocalFs;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: Utf8PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
            Self { _dir: dir, root }
        }

        fn file(&self, name: &str, contents: &[u8]) -> Utf8PathBuf {
            let path = self.root.join(name);
            fs::write(&path, contents).unwrap();
            path
        }
    }

    fn original(size: u64) -> FstNode {
        FstNode::with_source("target.bin", size, ContentOrigin::Volume { offset: 0 })
    }

    fn patch(external: &Utf8Path, offset: u64, length: u64, resize: bool) -> ContentPatch<'_> {
        ContentPatch {
            external,
            external_offset: 0,
            offset,
            length,
            resize,
        }
    }

    fn spans(node: &FstNode) -> Vec<(u64, u64, ContentOrigin)> {
        node.sources()
            .unwrap()
            .iter()
            .map(|s| (s.offset, s.end(), s.origin.clone()))
            .collect()
    }

    fn external(path: &Utf8Path, offset: u64) -> ContentOrigin {
        ContentOrigin::External {
            path: path.to_path_buf(),
            offset,
        }
    }

    #[test]
    fn test_extend_past_end() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"abcd");
        let mut node = original(10);

        assert!(apply_content_patch(
            &LocalFs,
            &mut node,
            &patch(&ext, 12, 0, false)
        ));

        assert_eq!(node.size, 16);
        assert_eq!(
            spans(&node),
            vec![
                (0, 10, ContentOrigin::Volume { offset: 0 }),
                (10, 12, ContentOrigin::Fill(0)),
                (12, 16, external(&ext, 0)),
            ]
        );
    }

    #[test]
    fn test_shrink_via_overwrite() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"abcdefgh");
        let mut node = original(10);

        apply_content_patch(&LocalFs, &mut node, &patch(&ext, 3, 4, true));

        assert_eq!(node.size, 7);
        assert_eq!(
            spans(&node),
            vec![
                (0, 3, ContentOrigin::Volume { offset: 0 }),
                (3, 7, external(&ext, 0)),
            ]
        );
    }

    #[test]
    fn test_overwrite_middle_keeps_tail() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"abcd");
        let mut node = original(10);

        apply_content_patch(&LocalFs, &mut node, &patch(&ext, 3, 0, false));

        assert_eq!(node.size, 10);
        assert_eq!(
            spans(&node),
            vec![
                (0, 3, ContentOrigin::Volume { offset: 0 }),
                (3, 7, external(&ext, 0)),
                (7, 10, ContentOrigin::Volume { offset: 7 }),
            ]
        );
    }

    #[test]
    fn test_overwrite_spanning_several_sources() {
        let fx = Fixture::new();
        let first = fx.file("first.bin", b"0123456789");
        let second = fx.file("second.bin", b"abcdef");
        let mut node = original(10);

        // [0,2) vol, [2,6) first, [6,10) vol
        apply_content_patch(&LocalFs, &mut node, &patch(&first, 2, 4, false));
        // [0,1) vol, [1,7) second, [7,10) vol
        apply_content_patch(&LocalFs, &mut node, &patch(&second, 1, 0, false));

        assert_eq!(
            spans(&node),
            vec![
                (0, 1, ContentOrigin::Volume { offset: 0 }),
                (1, 7, external(&second, 0)),
                (7, 10, ContentOrigin::Volume { offset: 7 }),
            ]
        );
        assert!(node.has_exact_coverage());
    }

    #[test]
    fn test_split_advances_external_offset() {
        let fx = Fixture::new();
        let big = fx.file("big.bin", b"0123456789");
        let small = fx.file("small.bin", b"xy");
        let mut node = FstNode::new_file("f");

        apply_content_patch(&LocalFs, &mut node, &patch(&big, 0, 0, true));
        apply_content_patch(&LocalFs, &mut node, &patch(&small, 4, 0, false));

        assert_eq!(
            spans(&node),
            vec![
                (0, 4, external(&big, 0)),
                (4, 6, external(&small, 0)),
                (6, 10, external(&big, 6)),
            ]
        );
    }

    #[test]
    fn test_overlap_extending_past_end() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"abcdef");
        let mut node = original(10);

        apply_content_patch(&LocalFs, &mut node, &patch(&ext, 8, 0, false));

        assert_eq!(node.size, 14);
        assert_eq!(
            spans(&node),
            vec![
                (0, 8, ContentOrigin::Volume { offset: 0 }),
                (8, 14, external(&ext, 0)),
            ]
        );
    }

    #[test]
    fn test_length_longer_than_external_pads_with_zero() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"ab");
        let mut node = original(4);

        apply_content_patch(&LocalFs, &mut node, &patch(&ext, 1, 6, false));

        assert_eq!(node.size, 7);
        assert_eq!(
            spans(&node),
            vec![
                (0, 1, ContentOrigin::Volume { offset: 0 }),
                (1, 3, external(&ext, 0)),
                (3, 7, ContentOrigin::Fill(0)),
            ]
        );
    }

    #[test]
    fn test_external_offset() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"0123456789");
        let mut node = FstNode::new_file("f");

        let content = ContentPatch {
            external: &ext,
            external_offset: 6,
            offset: 0,
            length: 0,
            resize: true,
        };
        apply_content_patch(&LocalFs, &mut node, &content);

        assert_eq!(node.size, 4);
        assert_eq!(spans(&node), vec![(0, 4, external(&ext, 6))]);
    }

    #[test]
    fn test_resize_to_empty() {
        let fx = Fixture::new();
        let empty = fx.file("empty.bin", b"");
        let mut node = original(10);

        apply_content_patch(&LocalFs, &mut node, &patch(&empty, 0, 0, true));

        assert_eq!(node.size, 0);
        assert!(node.sources().unwrap().is_empty());
        assert!(node.has_exact_coverage());
    }

    #[test]
    fn test_missing_external_is_noop() {
        let fx = Fixture::new();
        let mut node = original(10);
        let before = node.clone();

        let missing = fx.root.join("missing.bin");
        assert!(!apply_content_patch(
            &LocalFs,
            &mut node,
            &patch(&missing, 0, 0, true)
        ));
        assert_eq!(node, before);
    }

    #[test]
    fn test_folder_is_noop() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"abc");
        let mut node = FstNode::new_folder("dir");

        assert!(!apply_content_patch(
            &LocalFs,
            &mut node,
            &patch(&ext, 0, 0, true)
        ));
        assert_eq!(node, FstNode::new_folder("dir"));
    }

    #[test]
    fn test_patched_bytes_read_back() {
        let fx = Fixture::new();
        let ext = fx.file("ext.bin", b"XY");
        let volume: Vec<u8> = b"abcdefgh".to_vec();
        let mut node = FstNode::with_source("f", 8, ContentOrigin::Volume { offset: 0 });

        apply_content_patch(&LocalFs, &mut node, &patch(&ext, 2, 0, false));
        apply_content_patch(&LocalFs, &mut node, &patch(&ext, 10, 0, false));

        let data = node.read_to_vec(&volume, &LocalFs).unwrap();
        assert_eq!(data, b"abXYefgh\0\0XY");
    }
}
