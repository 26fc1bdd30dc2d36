use crate::errors::CliError;
use crate::println_pad;
use crate::utils;
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use miette::IntoDiagnostic;
use riivo_patch::apply::{self, ApplyStats};
use riivo_patch::{export, fst, ContentOrigin, FstNode, HostFs, LocalFs, NoVolume};

pub struct ApplyPatchesArgs {
    pub xml: Utf8PathBuf,
    pub game_id: String,
    pub revision: u16,
    pub disc: u8,
    pub files: Utf8PathBuf,
    pub dol: Option<Utf8PathBuf>,
    pub output: Utf8PathBuf,
    pub sd_root: Option<Utf8PathBuf>,
    pub patches: Vec<String>,
}

/// Apply disc patches to an extracted disc and write the result.
///
/// The output mirrors an extracted disc: the file tree goes to `<output>/files` and the
/// executable to `<output>/sys/main.dol`.
pub fn apply_patches(args: ApplyPatchesArgs) -> miette::Result<()> {
    let game = utils::game_identity(&args.game_id, args.revision, args.disc)?;
    let disc = utils::load_document(&args.xml, &game)?;
    let patches = utils::select_patches(&disc, &args.xml, args.sd_root, &args.patches)?;

    if !args.files.is_dir() {
        return Err(CliError::directory_not_found(args.files).into());
    }
    let host = LocalFs;
    let mut tree = fst::from_host_dir(&host, &args.files).into_diagnostic()?;

    let mut dol = match &args.dol {
        Some(path) => Some(load_dol(&host, path)?),
        None => None,
    };

    let mut total = ApplyStats::default();
    for patch in &patches {
        let stats = apply::apply_patch_to_fst(&host, patch, &mut tree);
        total.patched += stats.patched;
        total.skipped += stats.skipped;

        if let Some(dol) = dol.as_mut() {
            let stats = apply::apply_patch_to_dol(&host, patch, dol);
            total.patched += stats.patched;
            total.skipped += stats.skipped;
        }
    }

    let files_out = args.output.join("files");
    let exported =
        export::export_tree(&tree, &NoVolume, &host, &files_out).map_err(CliError::from)?;
    if let Some(dol) = &dol {
        let sys_out = args.output.join("sys");
        std::fs::create_dir_all(sys_out.as_std_path()).into_diagnostic()?;
        export::export_file(dol, &NoVolume, &host, &sys_out.join(apply::DOL_PATH))
            .map_err(CliError::from)?;
    }

    println!("{}", "✓ Patches applied".bright_green().bold());
    println!();
    println_pad!(
        "{} {}",
        "Patches:".bright_white().bold(),
        patches
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println_pad!(
        "{} {} patched, {} skipped",
        "Files:".bright_white().bold(),
        total.patched.to_string().bright_green(),
        total.skipped.to_string().bright_yellow()
    );
    println_pad!(
        "{} {} ({} file(s), {} byte(s))",
        "Output:".bright_white().bold(),
        args.output.as_str().bright_green(),
        exported.files,
        exported.bytes
    );

    Ok(())
}

fn load_dol(host: &dyn HostFs, path: &Utf8Path) -> miette::Result<FstNode> {
    let size = host
        .file_size(path)
        .map_err(|_| CliError::file_not_found(path.to_path_buf()))?;
    Ok(FstNode::with_source(
        apply::DOL_PATH,
        size,
        ContentOrigin::External {
            path: path.to_path_buf(),
            offset: 0,
        },
    ))
}
