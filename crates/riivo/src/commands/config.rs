use crate::errors::CliError;
use crate::utils::config::{self, AppConfig};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;

fn update_config(update: impl FnOnce(&mut AppConfig)) -> Result<()> {
    let mut cfg = config::load_config();
    update(&mut cfg);
    config::save_config(&cfg).map_err(|e| miette::miette!("Failed to save config: {}", e))
}

/// Print a config path entry with status indicator
fn print_path_config(name: &str, path: Option<&Utf8PathBuf>) {
    match path {
        Some(p) => {
            let status = if p.is_dir() {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", format!("{}:", name).bright_white(), p, status);
        }
        None => {
            println!(
                "  {} {}",
                format!("{}:", name).bright_white(),
                "(not set)".bright_yellow()
            );
        }
    }
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);
    print_path_config("riivolution_dir", cfg.riivolution_dir.as_ref());
    print_path_config("sd_root", cfg.sd_root.as_ref());
    println!();
    Ok(())
}

fn set_dir(name: &str, path: String, update: impl FnOnce(&mut AppConfig, Utf8PathBuf)) -> Result<()> {
    let path = Utf8PathBuf::from(path);
    if !path.is_dir() {
        return Err(CliError::directory_not_found(path).into());
    }

    let stored = path.clone();
    update_config(|cfg| update(cfg, stored))?;

    println!(
        "{}",
        format!("✓ {} set successfully!", name).bright_green().bold()
    );
    println!();
    println!(
        "  {} {}",
        "Path:".bright_white().bold(),
        path.as_str().bright_green()
    );

    Ok(())
}

pub fn set_riivolution_dir(path: String) -> Result<()> {
    set_dir("riivolution_dir", path, |cfg, p| cfg.riivolution_dir = Some(p))
}

pub fn set_sd_root(path: String) -> Result<()> {
    set_dir("sd_root", path, |cfg, p| cfg.sd_root = Some(p))
}

pub fn reset_config() -> Result<()> {
    config::save_config(&AppConfig::default())
        .map_err(|e| miette::miette!("Failed to reset config: {}", e))?;

    println!(
        "{}",
        "✓ Configuration reset to defaults".bright_green().bold()
    );
    Ok(())
}
