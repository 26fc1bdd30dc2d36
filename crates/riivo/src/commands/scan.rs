use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{self, config};
use camino::Utf8PathBuf;
use colored::Colorize;
use riivo_patch::discover;

pub struct ScanDocumentsArgs {
    pub game_id: String,
    pub revision: u16,
    pub disc: u8,
    pub dir: Option<Utf8PathBuf>,
}

pub fn scan_documents(args: ScanDocumentsArgs) -> miette::Result<()> {
    let game = utils::game_identity(&args.game_id, args.revision, args.disc)?;
    let dir = args
        .dir
        .or_else(|| config::load_config().riivolution_dir)
        .ok_or(CliError::MissingRiivolutionDir)?;
    if !dir.is_dir() {
        return Err(CliError::directory_not_found(dir).into());
    }

    let documents = discover::find_matching_documents(&dir, &game);

    println_pad!(
        "{} {} {}",
        "🔎 Documents for".bright_blue().bold(),
        game.full().bright_cyan().bold(),
        format!("in {}", dir).dimmed()
    );
    if documents.is_empty() {
        println_pad!("   {}", "(none found)".bright_yellow());
        return Ok(());
    }

    for (path, disc) in &documents {
        let ids: Vec<&str> = disc.patches.iter().map(|p| p.id.as_str()).collect();
        println_pad!(
            "   {} {} {}",
            "•".bright_cyan(),
            path.as_str().bright_white(),
            format!("[{}]", ids.join(", ")).dimmed()
        );
    }

    Ok(())
}
