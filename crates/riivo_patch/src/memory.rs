//! Guest RAM patching.
//!
//! [`apply_memory_patch`] performs one `<memory>` entry as an all-or-nothing write:
//! when the entry carries `original` bytes, every one of them is compared before the
//! first value byte is written.

use crate::host::HostFs;
use crate::model::{Memory, Patch};
use byteorder::{BigEndian, ByteOrder};
use camino::Utf8Path;

/// Byte-addressable guest memory. Guest values are big-endian.
pub trait GuestMemory {
    /// Read one byte, or `None` when `address` is not readable.
    fn read_u8(&self, address: u32) -> Option<u8>;

    /// Write one byte. Writes to unmapped addresses are dropped.
    fn write_u8(&mut self, address: u32, value: u8);

    fn read_u16(&self, address: u32) -> Option<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(address, &mut buf)?;
        Some(BigEndian::read_u16(&buf))
    }

    fn read_u32(&self, address: u32) -> Option<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(address, &mut buf)?;
        Some(BigEndian::read_u32(&buf))
    }

    fn write_u16(&mut self, address: u32, value: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, value);
        self.write_bytes(address, &buf);
    }

    fn write_u32(&mut self, address: u32, value: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        self.write_bytes(address, &buf);
    }

    /// Fill `buf` from consecutive addresses. Fails on the first unreadable byte.
    fn read_bytes(&self, address: u32, buf: &mut [u8]) -> Option<()> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_u8(address.wrapping_add(i as u32))?;
        }
        Some(())
    }

    /// Write `bytes` to consecutive addresses in ascending order.
    fn write_bytes(&mut self, address: u32, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.write_u8(address.wrapping_add(i as u32), *byte);
        }
    }
}

/// Result of applying one memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPatchOutcome {
    /// The value was written; holds the number of bytes.
    Written(usize),
    /// Ocarina or search entry; these are not supported and never written.
    Unsupported,
    /// The value file could not be read.
    ValueUnavailable,
    /// Memory did not hold the `original` bytes (or was unreadable there).
    OriginalMismatch,
}

impl MemoryPatchOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, MemoryPatchOutcome::Written(_))
    }
}

/// Apply one memory entry whose value file (if any) is relative to `root`.
pub fn apply_memory_patch(
    host: &dyn HostFs,
    root: &Utf8Path,
    entry: &Memory,
    memory: &mut dyn GuestMemory,
) -> MemoryPatchOutcome {
    if entry.is_unsupported() {
        tracing::debug!(
            "Skipping unsupported memory patch at {:#010x} (ocarina={}, search={})",
            entry.offset,
            entry.ocarina,
            entry.search
        );
        return MemoryPatchOutcome::Unsupported;
    }

    let file_value;
    let value: &[u8] = if entry.value_file.is_empty() {
        &entry.value
    } else {
        let path = root.join(entry.value_file.trim_start_matches('/'));
        match host.read_file(&path) {
            Ok(bytes) => {
                file_value = bytes;
                &file_value
            }
            Err(e) => {
                tracing::warn!("Skipping memory patch: cannot read '{}': {}", path, e);
                return MemoryPatchOutcome::ValueUnavailable;
            }
        }
    };

    if !entry.original.is_empty() {
        for (i, expected) in entry.original.iter().enumerate() {
            let address = entry.offset.wrapping_add(i as u32);
            if memory.read_u8(address) != Some(*expected) {
                tracing::debug!(
                    "Skipping memory patch at {:#010x}: original mismatch at {:#010x}",
                    entry.offset,
                    address
                );
                return MemoryPatchOutcome::OriginalMismatch;
            }
        }
    }

    memory.write_bytes(entry.offset, value);
    MemoryPatchOutcome::Written(value.len())
}

/// Apply every memory entry of `patch`, in document order.
pub fn apply_patch_to_memory(
    host: &dyn HostFs,
    patch: &Patch,
    memory: &mut dyn GuestMemory,
) -> Vec<MemoryPatchOutcome> {
    let outcomes: Vec<_> = patch
        .memory_patches
        .iter()
        .map(|entry| apply_memory_patch(host, &patch.root, entry, memory))
        .collect();

    tracing::info!(
        "Patch '{}': {}/{} memory patch(es) written",
        patch.id,
        outcomes.iter().filter(|o| o.is_written()).count(),
        outcomes.len()
    );
    outcomes
}

/// A contiguous RAM image mapped at `base`, e.g. a MEM1 dump mapped at `0x80000000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamImage {
    base: u32,
    data: Vec<u8>,
}

impl RamImage {
    pub fn new(base: u32, data: Vec<u8>) -> Self {
        Self { base, data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether `address` falls inside the image.
    pub fn contains(&self, address: u32) -> bool {
        self.index(address).is_some()
    }

    fn index(&self, address: u32) -> Option<usize> {
        let index = address.checked_sub(self.base)? as usize;
        (index < self.data.len()).then_some(index)
    }
}

impl GuestMemory for RamImage {
    fn read_u8(&self, address: u32) -> Option<u8> {
        self.index(address).map(|i| self.data[i])
    }

    fn write_u8(&mut self, address: u32, value: u8) {
        if let Some(i) = self.index(address) {
            self.data[i] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalFs;
    use camino::Utf8PathBuf;

    fn ram() -> RamImage {
        let mut data = vec![0u8; 0x2000];
        data[0x1000] = 0xAA;
        data[0x1001] = 0xBB;
        RamImage::new(0, data)
    }

    fn entry(value: &[u8], original: &[u8]) -> Memory {
        Memory {
            offset: 0x1000,
            value: value.to_vec(),
            original: original.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_original_mismatch_writes_nothing() {
        let mut memory = ram();
        let outcome = apply_memory_patch(
            &LocalFs,
            Utf8Path::new(""),
            &entry(&[0x11, 0x22], &[0xAA, 0xCC]),
            &mut memory,
        );

        assert_eq!(outcome, MemoryPatchOutcome::OriginalMismatch);
        assert_eq!(memory.read_u8(0x1000), Some(0xAA));
        assert_eq!(memory.read_u8(0x1001), Some(0xBB));
    }

    #[test]
    fn test_original_match_writes_value() {
        let mut memory = ram();
        let outcome = apply_memory_patch(
            &LocalFs,
            Utf8Path::new(""),
            &entry(&[0x11, 0x22, 0x33], &[0xAA, 0xBB]),
            &mut memory,
        );

        assert_eq!(outcome, MemoryPatchOutcome::Written(3));
        assert_eq!(memory.read_u16(0x1000), Some(0x1122));
        assert_eq!(memory.read_u8(0x1002), Some(0x33));
    }

    #[test]
    fn test_unreadable_original_aborts() {
        let mut memory = RamImage::new(0x8000_0000, vec![0u8; 4]);
        let patch = Memory {
            offset: 0x8000_0002,
            value: vec![1, 2, 3, 4],
            original: vec![0, 0, 0, 0],
            ..Default::default()
        };

        let outcome = apply_memory_patch(&LocalFs, Utf8Path::new(""), &patch, &mut memory);
        assert_eq!(outcome, MemoryPatchOutcome::OriginalMismatch);
        assert_eq!(memory.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_unsupported_variants_are_skipped() {
        let mut memory = ram();
        for patch in [
            Memory {
                ocarina: true,
                ..entry(&[1], &[])
            },
            Memory {
                search: true,
                ..entry(&[1], &[])
            },
        ] {
            let outcome = apply_memory_patch(&LocalFs, Utf8Path::new(""), &patch, &mut memory);
            assert_eq!(outcome, MemoryPatchOutcome::Unsupported);
        }
        assert_eq!(memory, ram());
    }

    #[test]
    fn test_value_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("value.bin"), [0xDE, 0xAD]).unwrap();

        let mut memory = ram();
        let patch = Memory {
            value_file: "/value.bin".to_string(),
            ..entry(&[0x00], &[])
        };
        let outcome = apply_memory_patch(&LocalFs, &root, &patch, &mut memory);
        assert_eq!(outcome, MemoryPatchOutcome::Written(2));
        assert_eq!(memory.read_u16(0x1000), Some(0xDEAD));

        let missing = Memory {
            value_file: "missing.bin".to_string(),
            ..entry(&[0x00], &[])
        };
        let outcome = apply_memory_patch(&LocalFs, &root, &missing, &mut memory);
        assert_eq!(outcome, MemoryPatchOutcome::ValueUnavailable);
        assert_eq!(memory.read_u16(0x1000), Some(0xDEAD));
    }

    #[test]
    fn test_patch_in_document_order() {
        let patch = Patch {
            id: "p".to_string(),
            memory_patches: vec![entry(&[1, 1], &[]), entry(&[2], &[0x01])],
            ..Default::default()
        };

        let mut memory = ram();
        let outcomes = apply_patch_to_memory(&LocalFs, &patch, &mut memory);
        assert_eq!(
            outcomes,
            vec![MemoryPatchOutcome::Written(2), MemoryPatchOutcome::Written(1)]
        );
        assert_eq!(memory.read_u16(0x1000), Some(0x0201));
    }

    #[test]
    fn test_empty_patch_leaves_memory() {
        let mut memory = ram();
        let outcomes = apply_patch_to_memory(&LocalFs, &Patch::default(), &mut memory);
        assert!(outcomes.is_empty());
        assert_eq!(memory, ram());
    }

    #[test]
    fn test_ram_image_words() {
        let mut memory = RamImage::new(0x8000_0000, vec![0u8; 8]);
        memory.write_u32(0x8000_0004, 0x1234_5678);
        assert_eq!(memory.read_u32(0x8000_0004), Some(0x1234_5678));
        assert_eq!(memory.as_bytes()[4..], [0x12, 0x34, 0x56, 0x78]);
        assert_eq!(memory.read_u32(0x8000_0006), None);
        assert!(!memory.contains(0x7fff_ffff));
    }
}
