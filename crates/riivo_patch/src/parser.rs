//! Riivolution XML document parser.
//!
//! Turns a `<wiidisc>` document plus a [`GameIdentity`] into a [`Disc`]. The document
//! is rejected as a whole when it is malformed, has the wrong version, or its `<id>`
//! filter does not match the game:
//!
//! ```xml
//! <wiidisc version="1" root="/mymod">
//!   <id game="RMC" developer="01" version="0">
//!     <region type="P" />
//!     <region type="E" />
//!   </id>
//!   <patch id="main" root="/mymod">
//!     <file disc="/Race/Course/castle_course.szs" external="castle.szs" />
//!     <folder external="/{$__gameid}{$__region}/Scene" disc="/Scene/UI" create="true" />
//!     <memory offset="0x80001000" value="38600001" original="38600000" />
//!     <savegame external="/save/{$__gameid}{$__region}{$__maker}" />
//!   </patch>
//! </wiidisc>
//! ```
//!
//! Attribute values are coerced leniently, matching how existing Riivolution documents
//! are written:
//!
//! - Booleans look only at the first character (`1tTyY` is true).
//! - Integers accept decimal or `0x` hex and degrade to 0 on garbage.
//! - Malformed hex byte strings decode to an empty value instead of failing the document.

use crate::error::{Error, Result};
use crate::game::GameIdentity;
use crate::model::{Disc, File, Folder, Memory, Patch, Savegame};
use camino::{Utf8Path, Utf8PathBuf};
use roxmltree::{Node, ParsingOptions};
use std::borrow::Cow;

/// Read and parse a patch document from disk.
pub fn parse_file(path: &Utf8Path, game: &GameIdentity) -> Result<Disc> {
    let bytes = std::fs::read(path.as_std_path())?;
    parse_bytes(&bytes, game)
}

/// Parse a patch document from raw bytes.
///
/// Invalid UTF-8 sequences are replaced with U+FFFD rather than rejecting the document.
pub fn parse_bytes(bytes: &[u8], game: &GameIdentity) -> Result<Disc> {
    let xml = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = xml {
        tracing::warn!("Patch document is not valid UTF-8, replacing invalid bytes");
    }
    parse_str(&xml, game)
}

/// Parse a patch document. A `<!DOCTYPE>` declaration is accepted.
pub fn parse_str(xml: &str, game: &GameIdentity) -> Result<Disc> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)?;

    let wiidisc = doc.root_element();
    if !wiidisc.has_tag_name("wiidisc") {
        return Err(Error::MissingRootElement);
    }

    let version = wiidisc
        .attribute("version")
        .map(parse_int)
        .unwrap_or(-1);
    if version != 1 {
        return Err(Error::UnsupportedVersion(version));
    }

    if let Some(id) = child_elements(wiidisc, "id").next() {
        check_identity(id, game)?;
    }

    let mut disc = Disc {
        version,
        root: game.substitute(attr_str(wiidisc, "root")),
        patches: Vec::new(),
    };

    for patch_node in child_elements(wiidisc, "patch") {
        disc.patches.push(parse_patch(patch_node, game));
    }

    tracing::debug!(
        "Parsed patch document for {}: {} patch(es)",
        game.full(),
        disc.patches.len()
    );

    Ok(disc)
}

/// Virtual SD card root for a document stored at `path`.
///
/// Patch documents conventionally live in `<sd>/riivolution/`, so the root is the
/// directory one level above the one holding the document. Documents without a
/// grandparent directory use their own directory.
pub fn document_root(path: &Utf8Path) -> Utf8PathBuf {
    let containing = path.parent().unwrap_or(Utf8Path::new(""));
    match containing.parent() {
        Some(parent) => parent.to_path_buf(),
        None => containing.to_path_buf(),
    }
}

/// Decode a hex byte string such as `0x38600001`.
///
/// An optional `0x` prefix is stripped. Odd-length input or any non-hex pair yields an
/// empty vector.
pub fn decode_hex(value: &str) -> Vec<u8> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.len() % 2 != 0 {
        return Vec::new();
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for pair in digits.as_bytes().chunks(2) {
        let parsed = std::str::from_utf8(pair)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok());
        match parsed {
            // from_str_radix accepts a leading '+', which is not a hex digit
            Some(b) if pair[0] != b'+' => bytes.push(b),
            _ => return Vec::new(),
        }
    }
    bytes
}

/// Filter a document against the running game. Unknown attributes are ignored.
fn check_identity(id: Node, game: &GameIdentity) -> Result<()> {
    for attribute in id.attributes() {
        let value = attribute.value();
        let matches = match attribute.name() {
            "game" => game.full().starts_with(value),
            "developer" => game.maker() == value,
            "disc" => i64::from(game.disc_number()) == parse_int(value),
            "version" => i64::from(game.revision()) == parse_int(value),
            _ => true,
        };

        if !matches {
            let actual = match attribute.name() {
                "game" => game.full().to_string(),
                "developer" => game.maker().to_string(),
                "disc" => game.disc_number().to_string(),
                _ => game.revision().to_string(),
            };
            return Err(Error::GameMismatch {
                attribute: attribute.name().to_string(),
                expected: value.to_string(),
                actual,
            });
        }
    }

    let mut regions = child_elements(id, "region").peekable();
    if regions.peek().is_none() {
        return Ok(());
    }
    let region = game.region();
    if regions.any(|r| attr_str(r, "type").chars().eq(std::iter::once(region))) {
        Ok(())
    } else {
        Err(Error::RegionMismatch(region))
    }
}

fn parse_patch(node: Node, game: &GameIdentity) -> Patch {
    let mut patch = Patch {
        id: attr_str(node, "id").to_string(),
        root: Utf8PathBuf::from(game.substitute(attr_str(node, "root"))),
        ..Default::default()
    };

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "file" => patch.file_patches.push(File {
                disc: game.substitute(attr_str(child, "disc")),
                external: game.substitute(attr_str(child, "external")),
                resize: attr_bool(child, "resize", true),
                create: attr_bool(child, "create", false),
                offset: attr_uint(child, "offset", 0),
                file_offset: attr_uint(child, "fileoffset", 0),
                length: attr_uint(child, "length", 0),
            }),
            "folder" => patch.folder_patches.push(Folder {
                disc: game.substitute(attr_str(child, "disc")),
                external: game.substitute(attr_str(child, "external")),
                resize: attr_bool(child, "resize", true),
                create: attr_bool(child, "create", false),
                recursive: attr_bool(child, "recursive", true),
                length: attr_uint(child, "length", 0),
            }),
            "savegame" => patch.savegame_patches.push(Savegame {
                external: game.substitute(attr_str(child, "external")),
                clone: attr_bool(child, "clone", true),
            }),
            "memory" => patch.memory_patches.push(Memory {
                offset: attr_uint(child, "offset", 0),
                value: decode_hex(attr_str(child, "value")),
                value_file: game.substitute(attr_str(child, "valuefile")),
                original: decode_hex(attr_str(child, "original")),
                ocarina: attr_bool(child, "ocarina", false),
                search: attr_bool(child, "search", false),
                align: attr_uint(child, "align", 1),
            }),
            other => {
                tracing::debug!("Ignoring unknown element <{}> in patch '{}'", other, patch.id);
            }
        }
    }

    patch
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.has_tag_name(name))
}

fn attr_str<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or("")
}

/// A present attribute is true when it starts with one of `1tTyY`.
fn attr_bool(node: Node, name: &str, default: bool) -> bool {
    match node.attribute(name) {
        Some(value) => matches!(value.chars().next(), Some('1' | 't' | 'T' | 'y' | 'Y')),
        None => default,
    }
}

fn attr_uint(node: Node, name: &str, default: u32) -> u32 {
    node.attribute(name).map(parse_uint).unwrap_or(default)
}

/// Leading whitespace, an optional sign and `0x` prefix, then as many digits as
/// parse. Returns `(negative, magnitude, overflowed)`.
fn parse_integer(value: &str) -> (bool, u64, bool) {
    let s = value.trim_start();
    let negative = s.starts_with('-');
    let s = s.strip_prefix(['-', '+']).unwrap_or(s);

    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };

    let mut result: u64 = 0;
    let mut overflow = false;
    for d in digits.chars().map_while(|c| c.to_digit(radix)) {
        match result
            .checked_mul(u64::from(radix))
            .and_then(|r| r.checked_add(u64::from(d)))
        {
            Some(r) => result = r,
            None => overflow = true,
        }
    }
    (negative, result, overflow)
}

fn parse_uint(value: &str) -> u32 {
    match parse_integer(value) {
        (true, _, _) => 0,
        (false, _, true) => u32::MAX,
        (false, v, false) => u32::try_from(v).unwrap_or(u32::MAX),
    }
}

fn parse_int(value: &str) -> i64 {
    let (negative, magnitude, overflow) = parse_integer(value);
    let (min, max) = (i64::from(i32::MIN), i64::from(i32::MAX));
    match (negative, overflow) {
        (true, true) => min,
        (false, true) => max,
        (true, false) => i64::try_from(magnitude).map(|m| (-m).max(min)).unwrap_or(min),
        (false, false) => i64::try_from(magnitude).map(|m| m.min(max)).unwrap_or(max),
    }
}
