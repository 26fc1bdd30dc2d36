use camino::Utf8PathBuf;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    apply_patches, inspect_document, poke_memory, scan_documents, ApplyPatchesArgs,
    InspectDocumentArgs, PokeMemoryArgs, ScanDocumentsArgs,
};
use miette::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log patch resolution details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Identity of the running game, used to filter and expand patch documents.
#[derive(clap::Args, Debug)]
struct GameArgs {
    /// Six character game id, e.g. RMCP01
    #[arg(short, long)]
    game_id: String,

    /// Disc revision
    #[arg(long, default_value_t = 0)]
    revision: u16,

    /// Disc number
    #[arg(long, default_value_t = 0)]
    disc: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the patches of a Riivolution document
    Inspect {
        /// The path to the XML document
        #[arg(short, long)]
        xml: Utf8PathBuf,

        #[command(flatten)]
        game: GameArgs,

        /// Print the parsed document as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the documents in a directory that apply to a game
    Scan {
        #[command(flatten)]
        game: GameArgs,

        /// Directory to search (defaults to the configured riivolution_dir)
        #[arg(short, long)]
        dir: Option<Utf8PathBuf>,
    },
    /// Apply disc patches to an extracted disc
    Apply {
        /// The path to the XML document
        #[arg(short, long)]
        xml: Utf8PathBuf,

        #[command(flatten)]
        game: GameArgs,

        /// The extracted disc's file tree
        #[arg(short, long)]
        files: Utf8PathBuf,

        /// The extracted main.dol
        #[arg(long)]
        dol: Option<Utf8PathBuf>,

        /// The directory to write the patched disc to
        #[arg(short, long, default_value = "patched")]
        output: Utf8PathBuf,

        /// SD card root patch paths are resolved against
        #[arg(long)]
        sd_root: Option<Utf8PathBuf>,

        /// Patch ids to apply (all when omitted)
        #[arg(short, long = "patch")]
        patches: Vec<String>,
    },
    /// Apply memory patches to a RAM dump in place
    Poke {
        /// The path to the XML document
        #[arg(short, long)]
        xml: Utf8PathBuf,

        #[command(flatten)]
        game: GameArgs,

        /// The RAM dump to patch
        #[arg(short, long)]
        ram: Utf8PathBuf,

        /// Guest address of the first byte of the dump
        #[arg(long, default_value = "0x80000000")]
        base: String,

        /// SD card root patch paths are resolved against
        #[arg(long)]
        sd_root: Option<Utf8PathBuf>,

        /// Patch ids to apply (all when omitted)
        #[arg(short, long = "patch")]
        patches: Vec<String>,
    },
    /// Manage riivo.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the current configuration
    Show,
    /// Set the directory searched for patch documents
    SetRiivolutionDir { path: String },
    /// Set the SD card root
    SetSdRoot { path: String },
    /// Reset the configuration to defaults
    Reset,
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "riivo=debug,riivo_patch=debug"
    } else {
        "riivo=info,riivo_patch=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbose);

    match args.command {
        Commands::Inspect { xml, game, json } => inspect_document(InspectDocumentArgs {
            xml,
            game_id: game.game_id,
            revision: game.revision,
            disc: game.disc,
            json,
        }),
        Commands::Scan { game, dir } => scan_documents(ScanDocumentsArgs {
            game_id: game.game_id,
            revision: game.revision,
            disc: game.disc,
            dir,
        }),
        Commands::Apply {
            xml,
            game,
            files,
            dol,
            output,
            sd_root,
            patches,
        } => apply_patches(ApplyPatchesArgs {
            xml,
            game_id: game.game_id,
            revision: game.revision,
            disc: game.disc,
            files,
            dol,
            output,
            sd_root,
            patches,
        }),
        Commands::Poke {
            xml,
            game,
            ram,
            base,
            sd_root,
            patches,
        } => poke_memory(PokeMemoryArgs {
            xml,
            game_id: game.game_id,
            revision: game.revision,
            disc: game.disc,
            ram,
            base,
            sd_root,
            patches,
        }),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(),
            ConfigAction::SetRiivolutionDir { path } => commands::config::set_riivolution_dir(path),
            ConfigAction::SetSdRoot { path } => commands::config::set_sd_root(path),
            ConfigAction::Reset => commands::config::reset_config(),
        },
    }
}
