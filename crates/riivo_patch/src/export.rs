//! Writing a virtual tree out to the host filesystem.

use crate::error::{Error, Result};
use crate::fst::{ContentOrigin, FstNode, NodeContent, VolumeReader};
use crate::host::HostFs;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{BufWriter, Write};

const CHUNK_SIZE: usize = 1024 * 1024;

/// Totals of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub files: usize,
    pub folders: usize,
    pub bytes: u64,
}

/// Write `nodes` below `dest`, creating `dest` if needed.
///
/// Fails before writing anything when a host file the tree reads from lies inside `dest`.
pub fn export_tree(
    nodes: &[FstNode],
    volume: &dyn VolumeReader,
    host: &dyn HostFs,
    dest: &Utf8Path,
) -> Result<ExportStats> {
    check_overlap(nodes, dest)?;
    fs::create_dir_all(dest.as_std_path())?;

    let mut stats = ExportStats::default();
    export_level(nodes, volume, host, dest, &mut stats)?;

    tracing::info!(
        "Exported {} file(s), {} folder(s), {} byte(s) to {}",
        stats.files,
        stats.folders,
        stats.bytes,
        dest
    );
    Ok(stats)
}

fn export_level(
    nodes: &[FstNode],
    volume: &dyn VolumeReader,
    host: &dyn HostFs,
    dir: &Utf8Path,
    stats: &mut ExportStats,
) -> Result<()> {
    for node in nodes {
        check_filename(&node.filename)?;
        let path = dir.join(&node.filename);

        match &node.content {
            NodeContent::Folder(children) => {
                fs::create_dir_all(path.as_std_path())?;
                stats.folders += 1;
                export_level(children, volume, host, &path, stats)?;
            }
            NodeContent::File(_) => {
                stats.bytes += export_file(node, volume, host, &path)?;
                stats.files += 1;
            }
        }
    }
    Ok(())
}

/// Write a single file node to `path`, streaming its sources in order.
///
/// Returns the number of bytes written.
pub fn export_file(
    node: &FstNode,
    volume: &dyn VolumeReader,
    host: &dyn HostFs,
    path: &Utf8Path,
) -> Result<u64> {
    let Some(sources) = node.sources() else {
        return Err(Error::Other(format!("'{}' is a folder", node.filename)));
    };
    if !node.has_exact_coverage() {
        return Err(Error::Other(format!(
            "Content of '{}' does not cover its {} byte(s)",
            node.filename, node.size
        )));
    }

    check_overlap(std::slice::from_ref(node), path)?;

    let mut writer = BufWriter::new(fs::File::create(path.as_std_path())?);
    let mut buf = vec![0u8; CHUNK_SIZE.min(node.size as usize)];

    for source in sources {
        let mut done = 0u64;
        while done < source.size {
            let len = (source.size - done).min(buf.len() as u64) as usize;
            let chunk = &mut buf[..len];
            source.origin.read(volume, host, done, chunk)?;
            writer.write_all(chunk)?;
            done += len as u64;
        }
    }
    writer.flush()?;

    tracing::debug!("Wrote {} ({} bytes, {} source(s))", path, node.size, sources.len());
    Ok(node.size)
}

fn check_overlap(nodes: &[FstNode], dest: &Utf8Path) -> Result<()> {
    let output = absolute(dest);
    match external_under(nodes, &output) {
        Some(input) => Err(Error::OutputOverlapsInput {
            output: dest.to_path_buf(),
            input: input.to_path_buf(),
        }),
        None => Ok(()),
    }
}

/// First external source path of `nodes` at or below `dir`.
fn external_under<'a>(nodes: &'a [FstNode], dir: &Utf8Path) -> Option<&'a Utf8Path> {
    nodes.iter().find_map(|node| match &node.content {
        NodeContent::Folder(children) => external_under(children, dir),
        NodeContent::File(sources) => sources.iter().find_map(|source| match &source.origin {
            ContentOrigin::External { path, .. } if absolute(path).starts_with(dir) => {
                Some(path.as_path())
            }
            _ => None,
        }),
    })
}

/// Lexically absolute form of `path`, without `.` components.
fn absolute(path: &Utf8Path) -> Utf8PathBuf {
    let cwd = std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok());
    let joined = match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };
    joined
        .components()
        .filter(|c| !matches!(c, Utf8Component::CurDir))
        .collect()
}

fn check_filename(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::Other(format!("Invalid file name '{}'", name)));
    }
    Ok(())
}
