//! Per-frame patches.
//!
//! Frame patches are small cheat-style writes re-applied on every frame while the game
//! runs. They come from game configuration sections where a `$Name` line opens a patch and
//! each following line is one entry:
//!
//! ```text
//! $Infinite lives
//! 0x80351A2C:byte:0x00000009
//! 0x80351A30:word:0x00000063:0x00000001
//! ```

use crate::error::{Error, Result};
use crate::memory::GuestMemory;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Width of a frame patch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Byte,
    Word,
    Dword,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Byte => "byte",
            EntryKind::Word => "word",
            EntryKind::Dword => "dword",
        }
    }

    fn mask(&self) -> u32 {
        match self {
            EntryKind::Byte => 0xff,
            EntryKind::Word => 0xffff,
            EntryKind::Dword => u32::MAX,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "byte" => Some(EntryKind::Byte),
            "word" => Some(EntryKind::Word),
            "dword" => Some(EntryKind::Dword),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One write of a frame patch. With a `comparand` the write only happens when memory
/// currently holds that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameEntry {
    pub kind: EntryKind,
    pub address: u32,
    pub value: u32,
    pub comparand: Option<u32>,
}

impl FrameEntry {
    /// Apply the entry. Returns whether memory was written.
    ///
    /// Narrow writes compare against the comparand truncated to their width.
    pub fn apply(&self, memory: &mut dyn GuestMemory) -> bool {
        let current = match self.kind {
            EntryKind::Byte => memory.read_u8(self.address).map(u32::from),
            EntryKind::Word => memory.read_u16(self.address).map(u32::from),
            EntryKind::Dword => memory.read_u32(self.address),
        };
        if let Some(comparand) = self.comparand {
            if current != Some(comparand & self.kind.mask()) {
                return false;
            }
        }

        match self.kind {
            EntryKind::Byte => memory.write_u8(self.address, self.value as u8),
            EntryKind::Word => memory.write_u16(self.address, self.value as u16),
            EntryKind::Dword => memory.write_u32(self.address, self.value),
        }
        true
    }
}

impl FromStr for FrameEntry {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let invalid = || Error::InvalidFrameLine(line.to_string());

        let normalized = line.replacen('=', ":", 1);
        let items: Vec<&str> = normalized.split(':').collect();
        if items.len() < 3 {
            return Err(invalid());
        }

        let address = parse_number(items[0]).ok_or_else(invalid)?;
        let value = parse_number(items[2]).ok_or_else(invalid)?;
        let comparand = match items.get(3) {
            Some(item) => Some(parse_number(item).ok_or_else(invalid)?),
            None => None,
        };
        let kind = EntryKind::from_name(items[1]).ok_or_else(invalid)?;

        Ok(FrameEntry {
            kind,
            address,
            value,
            comparand,
        })
    }
}

impl fmt::Display for FrameEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}:{}:0x{:08X}", self.address, self.kind, self.value)?;
        if let Some(comparand) = self.comparand {
            write!(f, ":0x{:08X}", comparand)?;
        }
        Ok(())
    }
}

/// A named group of frame entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FramePatch {
    pub name: String,
    pub entries: Vec<FrameEntry>,
    pub enabled: bool,
}

impl FramePatch {
    /// Apply every entry when the patch is enabled. Returns the number of writes.
    pub fn apply(&self, memory: &mut dyn GuestMemory) -> usize {
        if !self.enabled {
            return 0;
        }
        self.entries.iter().filter(|e| e.apply(memory)).count()
    }
}

/// Group the lines of a patch section into [`FramePatch`]es.
///
/// Lines before the first `$Name` header and lines that do not parse are ignored. Patches
/// without any entry are dropped. Every patch starts disabled.
pub fn parse_frame_section<I, S>(lines: I) -> Vec<FramePatch>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut patches = Vec::new();
    let mut current: Option<FramePatch> = None;

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix('$') {
            if let Some(done) = current.take() {
                patches.push(done);
            }
            current = Some(FramePatch {
                name: name.to_string(),
                entries: Vec::new(),
                enabled: false,
            });
            continue;
        }

        let Some(patch) = current.as_mut() else {
            continue;
        };
        match line.parse::<FrameEntry>() {
            Ok(entry) => patch.entries.push(entry),
            Err(e) => tracing::warn!("Ignoring frame patch line in '{}': {}", patch.name, e),
        }
    }
    patches.extend(current);

    patches.retain(|p| !p.entries.is_empty());
    patches
}

/// Apply an enable section: every `$Name` line switches the named patch on.
pub fn enable_from_section<I, S>(patches: &mut [FramePatch], lines: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for line in lines {
        let Some(name) = line.as_ref().trim().strip_prefix('$') else {
            continue;
        };
        for patch in patches.iter_mut().filter(|p| p.name == name) {
            patch.enabled = true;
        }
    }
}

/// Parse `ADDRESS = CYCLES` speed-hack lines. Lines that do not parse are skipped.
pub fn parse_speed_hacks<I, S>(lines: I) -> BTreeMap<u32, u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hacks = BTreeMap::new();
    for line in lines {
        let line = line.as_ref();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match (parse_number(key.trim()), parse_number(value.trim())) {
            (Some(address), Some(cycles)) => {
                hacks.insert(address, cycles);
            }
            _ => tracing::debug!("Ignoring speed hack line '{}'", line),
        }
    }
    hacks
}

/// A whole-string decimal or `0x` hex number.
pub fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
