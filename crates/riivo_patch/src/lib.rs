//! Riivolution patch engine.
//!
//! This crate loads Riivolution `<wiidisc>` patch documents and applies them to a game:
//!
//! - **Disc patches** overlay host files onto a virtual file system tree ([`fst`]) without
//!   copying any data until the tree is exported.
//! - **Memory patches** write bytes into guest RAM, optionally guarded by the bytes that
//!   must currently be there.
//! - **Frame patches** and the memory patch registry are held by a [`PatchSession`] for
//!   the lifetime of a running game.
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use riivo_patch::{apply, export, fst, parser, GameIdentity, LocalFs, NoVolume};
//!
//! # fn main() -> riivo_patch::Result<()> {
//! let game = GameIdentity::new("RMCP01", 0, 0)?;
//! let xml = Utf8Path::new("/sd/riivolution/mymod.xml");
//! let disc = parser::parse_file(xml, &game)?;
//!
//! let patches = disc.generate_patches(&parser::document_root(xml), &["main"]);
//! let mut tree = fst::from_host_dir(&LocalFs, Utf8Path::new("/extracted/files"))?;
//! for patch in &patches {
//!     apply::apply_patch_to_fst(&LocalFs, patch, &mut tree);
//! }
//!
//! export::export_tree(&tree, &NoVolume, &LocalFs, Utf8Path::new("/out/files"))?;
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod discover;
pub mod error;
pub mod export;
pub mod frame;
pub mod fst;
pub mod game;
pub mod host;
pub mod memory;
pub mod model;
pub mod overlay;
pub mod parser;
pub mod session;

pub use error::{Error, Result};
pub use fst::{ContentOrigin, ContentSource, FstNode, NoVolume, NodeContent, VolumeReader};
pub use game::GameIdentity;
pub use host::{HostFs, LocalFs};
pub use memory::{GuestMemory, MemoryPatchOutcome, RamImage};
pub use model::{Disc, File, Folder, Memory, Patch, Savegame};
pub use session::{GuestCpu, PatchSession};
