use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Invalid game id: {game_id}")]
    #[diagnostic(
        code(game::invalid_id),
        help("Game ids are six characters, e.g. RMCP01 (game code, region, maker)")
    )]
    InvalidGameId { game_id: String },

    #[error("Patch document rejected: {path}")]
    #[diagnostic(
        code(document::rejected),
        help("Check that the document is a <wiidisc version=\"1\"> file for this game and region")
    )]
    DocumentRejected {
        path: Utf8PathBuf,
        #[source]
        source: riivo_patch::Error,
    },

    #[error("Unknown patch id: {id}")]
    #[diagnostic(
        code(document::unknown_patch),
        help("Run 'riivo inspect' to list the patch ids of the document")
    )]
    UnknownPatch { id: String },

    #[error("Invalid address: {value}")]
    #[diagnostic(
        code(poke::invalid_address),
        help("Use decimal or 0x-prefixed hex, e.g. 0x80000000")
    )]
    InvalidAddress { value: String },

    #[error("Directory not found: {path}")]
    #[diagnostic(
        code(fs::dir_not_found),
        help("Make sure the directory exists and the path is correct")
    )]
    DirectoryNotFound { path: Utf8PathBuf },

    #[error("File not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    FileNotFound { path: Utf8PathBuf },

    #[error("No document directory configured")]
    #[diagnostic(
        code(config::missing_riivolution_dir),
        help("Pass --dir or run 'riivo config set-riivolution-dir <path>'")
    )]
    MissingRiivolutionDir,

    #[error("Patching failed")]
    #[diagnostic(code(patch::failed))]
    Patch {
        #[from]
        source: riivo_patch::Error,
    },
}

impl CliError {
    pub fn document_rejected(path: Utf8PathBuf, source: riivo_patch::Error) -> Self {
        Self::DocumentRejected { path, source }
    }

    pub fn unknown_patch(id: impl Into<String>) -> Self {
        Self::UnknownPatch { id: id.into() }
    }

    pub fn invalid_address(value: impl Into<String>) -> Self {
        Self::InvalidAddress {
            value: value.into(),
        }
    }

    pub fn directory_not_found(path: Utf8PathBuf) -> Self {
        Self::DirectoryNotFound { path }
    }

    pub fn file_not_found(path: Utf8PathBuf) -> Self {
        Self::FileNotFound { path }
    }
}
