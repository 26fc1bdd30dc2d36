//! Error types for patch parsing and application.
//!
//! Fallible functions in this crate return [`Result<T>`], which uses [`Error`] as the
//! error type. Rejecting a patch document is an error here; callers scanning several
//! candidate documents simply move on to the next one.
//!
//! Failures scoped to a single patch entry (a missing external file, an unresolvable
//! disc path, a memory comparison mismatch) are *not* errors: they are logged and the
//! entry is skipped so the remaining entries still apply.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading patch documents or session data.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (reading a document, exporting a tree, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The game identifier is not exactly six characters long.
    #[error("Invalid game id '{0}': expected 6 characters")]
    InvalidGameId(String),

    /// The document has no `<wiidisc>` root element.
    #[error("Missing <wiidisc> root element")]
    MissingRootElement,

    /// The root element declares a version other than 1.
    #[error("Unsupported patch document version: {0}")]
    UnsupportedVersion(i64),

    /// An attribute of the `<id>` filter does not match the running game.
    #[error("Document is for {attribute} '{expected}', game has '{actual}'")]
    GameMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    /// The `<id>` filter lists regions and the game's region is not among them.
    #[error("Document does not list region '{0}'")]
    RegionMismatch(char),

    /// A frame patch line could not be parsed.
    #[error("Invalid frame patch line: {0}")]
    InvalidFrameLine(String),

    /// An export destination would overwrite a file the tree still reads from.
    #[error("Output '{output}' overlaps input '{input}'")]
    OutputOverlapsInput { output: Utf8PathBuf, input: Utf8PathBuf },

    /// Catch-all for errors from other sources.
    #[error("{0}")]
    Other(String),
}
