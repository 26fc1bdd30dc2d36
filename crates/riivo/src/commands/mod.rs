pub mod apply;
pub mod config;
pub mod inspect;
pub mod poke;
pub mod scan;

pub use apply::{apply_patches, ApplyPatchesArgs};
pub use inspect::{inspect_document, InspectDocumentArgs};
pub use poke::{poke_memory, PokeMemoryArgs};
pub use scan::{scan_documents, ScanDocumentsArgs};
