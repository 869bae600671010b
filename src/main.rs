use std::fs;
use std::io::{self, Write};

use colored::*;
use reqwest::blocking::Client;

mod apod;
mod archive;
mod config;
mod download;
mod error;
mod progress;
mod wallpaper;

#[cfg(test)]
mod test_support;

use apod::{ApodEntry, MediaType};
use config::{Command, Config};
use error::{ApodError, Result};
use progress::Spinner;

// Windows-specific imports for the console fix below
#[cfg(target_os = "windows")]
use windows::Win32::System::Console::*;

// ============================================================================
// Windows Terminal ANSI Fix
// ============================================================================
#[cfg(target_os = "windows")]
fn enable_ansi_support() {
    unsafe {
        if let Ok(handle) = GetStdHandle(STD_OUTPUT_HANDLE) {
            let mut mode: CONSOLE_MODE = CONSOLE_MODE(0);
            if GetConsoleMode(handle, &mut mode).is_ok() {
                SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING).ok();
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn enable_ansi_support() {}

// What to do with the fetched entry
#[derive(Debug, PartialEq)]
enum MediaAction {
    SetWallpaper,
    SkipVideo,
    SkipOther,
}

fn media_action(entry: &ApodEntry) -> MediaAction {
    if entry.is_video() {
        MediaAction::SkipVideo
    } else if entry.media_type == MediaType::Other {
        MediaAction::SkipOther
    } else {
        MediaAction::SetWallpaper
    }
}

// ============================================================================
// Main Application
// ============================================================================
struct ApodCli {
    config: Config,
}

impl ApodCli {
    fn new(config: Config) -> Self {
        ApodCli { config }
    }

    fn center_text(text: &str, width: usize) -> String {
        let text_len = text.chars().count();
        if text_len >= width {
            return text.to_string();
        }
        let padding = width - text_len;
        let left_pad = padding / 2;
        let right_pad = padding - left_pad;
        format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
    }

    fn print_header(title: &str) {
        println!();
        println!("{}", "+------------------------------------------+".cyan());
        println!("{}", format!("| {} |", Self::center_text(title, 40)).cyan().bold());
        println!("{}", "+------------------------------------------+".cyan());
        println!();
    }

    // Append-only run log next to the pictures; never fails the run
    fn log_silent(&self, message: &str) {
        if let Ok(mut file) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.log_file())
        {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "[{}] {}", timestamp, message);
        }
    }

    // ========================================================================
    // RUN - fetch, download, archive, set wallpaper
    // ========================================================================
    fn run(&self) -> Result<()> {
        Self::print_header("Astronomy Picture of the Day");

        fs::create_dir_all(&self.config.work_dir)?;

        let (api_key, key_source) = config::load_api_key(&self.config.work_dir);
        if key_source == config::KeySource::Demo {
            println!("{}", "! No API key configured, using NASA's DEMO_KEY".cyan());
            println!("{}", "  Get a free key at: https://api.nasa.gov".dimmed());
            println!();
        }
        self.log_silent(&format!("Using API key from {}", key_source));

        let client = apod::build_client()?;
        let url = apod::build_api_url(&api_key, self.config.date);

        let mut spinner = Spinner::new();
        spinner.start("Fetching APOD data");
        let entry = match apod::fetch_entry(&client, &url) {
            Ok(entry) => entry,
            Err(e) => {
                spinner.error("Failed to fetch API data");
                return Err(e);
            }
        };
        spinner.complete("API data fetched");
        self.log_silent(&format!("Fetched APOD {} '{}' ({:?})", entry.date, entry.title, entry.media_type));

        println!();
        println!("{}", entry.title.bright_cyan().bold());
        println!("{}", entry.date.dimmed());
        println!();

        match media_action(&entry) {
            MediaAction::SkipVideo => {
                println!("{}", "[ INFO ] Media is a video, skipped".cyan());
                println!("  {}", entry.url);
                if let Some(thumb) = &entry.thumbnail_url {
                    println!("  {} {}", "Thumbnail:".dimmed(), thumb);
                }
            }
            MediaAction::SkipOther => {
                println!("{}", "[ INFO ] Media is not an image, skipped".cyan());
                println!("  {}", entry.url);
            }
            MediaAction::SetWallpaper => self.apply_image(&client, &entry)?,
        }

        println!();
        println!("{}", entry.explanation);
        if let Some(copyright) = &entry.copyright {
            println!();
            println!("{}", format!("© {}", copyright.trim()).dimmed());
        }

        Ok(())
    }

    fn apply_image(&self, client: &Client, entry: &ApodEntry) -> Result<()> {
        let dir = &self.config.work_dir;

        let downloaded = download::download_image(client, entry, dir)?;
        let image = downloaded.file_name().to_string();
        match &downloaded {
            download::Downloaded::Existing(_) => self.log_silent(&format!("Already downloaded '{}'", image)),
            download::Downloaded::Fetched { bytes, .. } => {
                self.log_silent(&format!("Downloaded '{}' ({} bytes)", image, bytes))
            }
        }

        let report = archive::archive_old_images(dir, &image, &self.config.archive_dir_name)?;
        if !report.archived.is_empty() {
            self.log_silent(&format!("Archived {} image(s)", report.archived.len()));
        }

        let full_path = wallpaper::absolute_path(&dir.join(&image))?;
        wallpaper::set_wallpaper(&full_path)?;
        println!("{}", format!("✓ Wallpaper set as '{}'", full_path.display()).green().bold());
        self.log_silent(&format!("Wallpaper set to {}", full_path.display()));

        Ok(())
    }

    fn report_error(&self, error: &ApodError) {
        eprintln!("{}", format!("[ ERROR ] {}", error).red());
        self.log_silent(&format!("ERROR: {}", error));
    }

    fn pause_before_exit(&self) {
        if !self.config.pause {
            return;
        }
        print!("{}", "\nPress Enter to exit... ".cyan());
        io::stdout().flush().ok();
        let mut input = String::new();
        io::stdin().read_line(&mut input).ok();
    }
}

fn show_help() {
    ApodCli::print_header("APOD Wallpaper - Help");
    println!("{}", "Usage:".green().bold());
    println!("  apod [DATE] [--dir <path>] [--no-pause]");
    println!();
    println!("{}", "Arguments:".green().bold());
    println!("  {}           Picture to fetch, YYYY-MM-DD (default: today)", "DATE".cyan());
    println!("  {} Folder for pictures (default: $APOD_DIR or current)", "-d, --dir <path>".cyan());
    println!("  {}    Exit without waiting for Enter", "-y, --no-pause".cyan());
    println!("  {}        Show this help", "-h, --help".cyan());
    println!();
    println!("{}", "API key:".green().bold());
    println!("  Set {} or put {} in a .env file", config::API_KEY_ENV.cyan(), "API_KEY=<key>".cyan());
    println!("  next to the pictures or the executable. Falls back to DEMO_KEY.");
    println!();
}

// ============================================================================
// Main Entry Point
// ============================================================================
fn main() {
    enable_ansi_support();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match Config::from_args(&args) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            show_help();
            return;
        }
        Err(e) => {
            eprintln!("{}", format!("[ ERROR ] {}", e).red());
            eprintln!("{}", "  Run 'apod --help' for usage".cyan());
            std::process::exit(e.exit_code());
        }
    };

    let cli = ApodCli::new(config);
    let result = cli.run();

    if let Err(e) = &result {
        cli.report_error(e);
    }

    cli.pause_before_exit();

    if let Err(e) = result {
        std::process::exit(e.exit_code());
    }
}
