//! Finding the patch documents that apply to a game.

use crate::game::GameIdentity;
use crate::model::Disc;
use crate::parser;
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

/// Parse every `.xml` file below `dir` and keep the documents that accept `game`.
///
/// Results are sorted by path. Documents that fail to parse or target another game are
/// skipped.
pub fn find_matching_documents(dir: &Utf8Path, game: &GameIdentity) -> Vec<(Utf8PathBuf, Disc)> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir.as_std_path())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
            continue;
        };
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if !is_xml {
            continue;
        }

        match parser::parse_file(&path, game) {
            Ok(disc) => documents.push((path, disc)),
            Err(e) => tracing::debug!("Skipping {}: {}", path, e),
        }
    }

    documents.sort_by(|(a, _), (b, _)| a.cmp(b));
    tracing::info!(
        "Found {} document(s) for {} in {}",
        documents.len(),
        game.full(),
        dir
    );
    documents
}
