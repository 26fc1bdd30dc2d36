use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use miette::Result;
use riivo_patch::{parser, Disc, GameIdentity, Patch};

pub mod config;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Game identity from the common `--game-id/--revision/--disc` arguments.
pub fn game_identity(game_id: &str, revision: u16, disc: u8) -> Result<GameIdentity> {
    GameIdentity::new(game_id, revision, disc).map_err(|_| {
        CliError::InvalidGameId {
            game_id: game_id.to_string(),
        }
        .into()
    })
}

/// Parse the document at `xml`, turning a rejection into a diagnostic.
pub fn load_document(xml: &Utf8Path, game: &GameIdentity) -> Result<Disc> {
    if !xml.is_file() {
        return Err(CliError::file_not_found(xml.to_path_buf()).into());
    }
    parser::parse_file(xml, game).map_err(|e| CliError::document_rejected(xml.to_path_buf(), e).into())
}

/// Resolve the selected patches of `disc` against the SD root.
///
/// The SD root is `sd_root` when given, then the configured one, then the directory
/// above the document's folder.
pub fn select_patches(
    disc: &Disc,
    xml: &Utf8Path,
    sd_root: Option<Utf8PathBuf>,
    selected: &[String],
) -> Result<Vec<Patch>> {
    if let Some(unknown) = selected.iter().find(|id| disc.patch(id).is_none()) {
        return Err(CliError::unknown_patch(unknown.as_str()).into());
    }

    let sd_root = sd_root
        .or_else(|| config::load_config().sd_root)
        .unwrap_or_else(|| parser::document_root(xml));
    Ok(disc.generate_patches(&sd_root, selected))
}
