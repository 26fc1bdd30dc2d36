use crate::println_pad;
use crate::utils;
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use miette::IntoDiagnostic;
use riivo_patch::{Disc, Patch};
use serde_json::to_string_pretty;

pub struct InspectDocumentArgs {
    pub xml: Utf8PathBuf,
    pub game_id: String,
    pub revision: u16,
    pub disc: u8,
    pub json: bool,
}

pub fn inspect_document(args: InspectDocumentArgs) -> miette::Result<()> {
    let game = utils::game_identity(&args.game_id, args.revision, args.disc)?;
    let disc = utils::load_document(&args.xml, &game)?;

    if args.json {
        println!("{}", to_string_pretty(&disc).into_diagnostic()?);
        return Ok(());
    }

    print_disc(&disc, &args.xml);
    Ok(())
}

fn print_disc(disc: &Disc, xml: &Utf8Path) {
    println_pad!(
        "{} {}",
        "📄 Document:".bright_blue().bold(),
        xml.as_str().bright_cyan().bold()
    );
    let root = if disc.root.is_empty() {
        "(none)"
    } else {
        disc.root.as_str()
    };
    println_pad!("{} {}", "📁 Root:".bright_green(), root.bright_white());

    println_pad!("\n{}", "🧩 Patches:".bright_magenta().bold());
    if disc.patches.is_empty() {
        println_pad!("   {}", "(none)".dimmed());
    }
    for patch in &disc.patches {
        print_patch(patch);
    }
}

fn print_patch(patch: &Patch) {
    println_pad!(
        "   {} {} {}",
        "•".bright_cyan(),
        patch.id.bright_cyan().bold(),
        format!(
            "(files: {}, folders: {}, savegames: {}, memory: {})",
            patch.file_patches.len(),
            patch.folder_patches.len(),
            patch.savegame_patches.len(),
            patch.memory_patches.len()
        )
        .dimmed()
    );

    for file in &patch.file_patches {
        println_pad!(
            "       {} {} {} {}",
            "file".bright_white(),
            file.external,
            "→".dimmed(),
            file.disc.bright_white()
        );
    }
    for folder in &patch.folder_patches {
        let disc = if folder.disc.is_empty() {
            "(by name)"
        } else {
            folder.disc.as_str()
        };
        println_pad!(
            "       {} {} {} {}",
            "folder".bright_white(),
            folder.external,
            "→".dimmed(),
            disc.bright_white()
        );
    }
    for memory in &patch.memory_patches {
        let size = if memory.value_file.is_empty() {
            format!("{} byte(s)", memory.value.len())
        } else {
            memory.value_file.clone()
        };
        let flags = match (memory.original.is_empty(), memory.is_unsupported()) {
            (_, true) => " (unsupported)".bright_yellow().to_string(),
            (false, false) => " (guarded)".dimmed().to_string(),
            (true, false) => String::new(),
        };
        println_pad!(
            "       {} {:#010x} {}{}",
            "memory".bright_white(),
            memory.offset,
            size,
            flags
        );
    }
}
