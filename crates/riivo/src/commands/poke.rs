use crate::errors::CliError;
use crate::println_pad;
use crate::utils;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::IntoDiagnostic;
use riivo_patch::{frame, LocalFs, MemoryPatchOutcome, PatchSession, RamImage};

pub struct PokeMemoryArgs {
    pub xml: Utf8PathBuf,
    pub game_id: String,
    pub revision: u16,
    pub disc: u8,
    pub ram: Utf8PathBuf,
    pub base: String,
    pub sd_root: Option<Utf8PathBuf>,
    pub patches: Vec<String>,
}

/// Apply the memory patches of a document to a RAM dump, in place.
pub fn poke_memory(args: PokeMemoryArgs) -> miette::Result<()> {
    let base = frame::parse_number(&args.base).ok_or_else(|| CliError::invalid_address(&args.base))?;
    let game = utils::game_identity(&args.game_id, args.revision, args.disc)?;
    let disc = utils::load_document(&args.xml, &game)?;
    let patches = utils::select_patches(&disc, &args.xml, args.sd_root, &args.patches)?;

    if !args.ram.is_file() {
        return Err(CliError::file_not_found(args.ram).into());
    }
    let dump = std::fs::read(args.ram.as_std_path()).into_diagnostic()?;
    let mut ram = RamImage::new(base, dump);

    let mut session = PatchSession::new(LocalFs);
    session.load_memory_patches(&patches);
    let outcomes = session.apply_boot_patches(&mut ram);

    std::fs::write(args.ram.as_std_path(), ram.as_bytes()).into_diagnostic()?;

    println_pad!(
        "{} {}",
        "🧠 RAM dump:".bright_blue().bold(),
        args.ram.as_str().bright_cyan().bold()
    );
    for (patch, outcome) in session.memory_patches().iter().zip(&outcomes) {
        let status = match outcome {
            MemoryPatchOutcome::Written(n) => format!("wrote {} byte(s)", n).bright_green(),
            MemoryPatchOutcome::Unsupported => "unsupported".bright_yellow(),
            MemoryPatchOutcome::ValueUnavailable => "value file unreadable".bright_red(),
            MemoryPatchOutcome::OriginalMismatch => "original mismatch".bright_yellow(),
        };
        println_pad!(
            "   {} {} {:#010x} {}",
            "•".bright_cyan(),
            patch.patch_id.bright_white(),
            patch.memory.offset,
            status
        );
    }

    let written = outcomes.iter().filter(|o| o.is_written()).count();
    println!();
    println!(
        "{}",
        format!("✓ {}/{} memory patch(es) written", written, outcomes.len())
            .bright_green()
            .bold()
    );

    Ok(())
}
