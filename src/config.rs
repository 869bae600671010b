// ============================================================================
// Configuration - API key lookup and command line settings
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::error::{ApodError, Result};

pub const API_KEY_ENV: &str = "APOD_API_KEY";
pub const DIR_ENV: &str = "APOD_DIR";
pub const ENV_FILE_NAME: &str = ".env";
pub const DEMO_KEY: &str = "DEMO_KEY";
pub const ARCHIVE_DIR_NAME: &str = "archived";
pub const LOG_FILE_NAME: &str = "apod.log";

// ============================================================================
// API Key
// ============================================================================

/// Where the API key came from, for the startup log line
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    Environment,
    EnvFile(PathBuf),
    BuildTime,
    Demo,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Environment => write!(f, "${}", API_KEY_ENV),
            KeySource::EnvFile(path) => write!(f, "{}", path.display()),
            KeySource::BuildTime => write!(f, "build-time key"),
            KeySource::Demo => write!(f, "{} (rate limited)", DEMO_KEY),
        }
    }
}

/// Resolve the API key: environment, then `.env` in the working directory,
/// then `.env` beside the executable, then a key baked in at build time.
pub fn load_api_key(work_dir: &Path) -> (String, KeySource) {
    let mut env_files = vec![work_dir.join(ENV_FILE_NAME)];
    if let Some(exe_dir) = env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        let candidate = exe_dir.join(ENV_FILE_NAME);
        if !env_files.contains(&candidate) {
            env_files.push(candidate);
        }
    }

    resolve_api_key(env::var(API_KEY_ENV).ok(), &env_files, option_env!("APOD_API_KEY"))
}

fn resolve_api_key(
    from_env: Option<String>,
    env_files: &[PathBuf],
    baked: Option<&str>,
) -> (String, KeySource) {
    if let Some(key) = from_env.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
        return (key, KeySource::Environment);
    }

    for path in env_files {
        if let Ok(contents) = fs::read_to_string(path) {
            if let Some(key) = parse_env_file(&contents) {
                return (key, KeySource::EnvFile(path.clone()));
            }
        }
    }

    match baked.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => (key.to_string(), KeySource::BuildTime),
        None => (DEMO_KEY.to_string(), KeySource::Demo),
    }
}

/// Extract `API_KEY=...` from the contents of a `.env` file
pub fn parse_env_file(contents: &str) -> Option<String> {
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        if name.trim() != "API_KEY" {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);

        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

// ============================================================================
// Run Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub work_dir: PathBuf,
    pub date: Option<NaiveDate>,
    pub pause: bool,
    pub archive_dir_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            work_dir: PathBuf::from("."),
            date: None,
            pause: true,
            archive_dir_name: ARCHIVE_DIR_NAME.to_string(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Run(Config),
    Help,
}

impl Config {
    pub fn log_file(&self) -> PathBuf {
        self.work_dir.join(LOG_FILE_NAME)
    }

    /// Parse the process arguments (without the program name)
    pub fn from_args(args: &[String]) -> Result<Command> {
        let env_dir = env::var_os(DIR_ENV).map(PathBuf::from);
        let cwd = env::current_dir()?;
        parse_args(args, env_dir, cwd, Local::now().date_naive())
    }
}

fn parse_args(
    args: &[String],
    env_dir: Option<PathBuf>,
    cwd: PathBuf,
    today: NaiveDate,
) -> Result<Command> {
    let mut config = Config {
        work_dir: env_dir.unwrap_or(cwd),
        ..Config::default()
    };
    let mut date_seen = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "help" | "--help" | "-h" | "h" | "?" => return Ok(Command::Help),
            "--no-pause" | "-y" => config.pause = false,
            "--dir" | "-d" => {
                let dir = iter
                    .next()
                    .ok_or_else(|| ApodError::Usage(format!("{} requires a directory", arg)))?;
                config.work_dir = PathBuf::from(dir);
            }
            other if other.starts_with('-') => {
                return Err(ApodError::Usage(format!("Unknown option: {}", other)));
            }
            other => {
                if date_seen {
                    return Err(ApodError::Usage(format!("Unexpected argument: {}", other)));
                }
                config.date = Some(parse_date(other, today)?);
                date_seen = true;
            }
        }
    }

    Ok(Command::Run(config))
}

/// The archive starts on 1995-06-16
pub fn first_apod_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1995, 6, 16).unwrap_or_default()
}

pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| ApodError::InvalidDate(input.to_string()))?;
    if date < first_apod_date() || date > today {
        return Err(ApodError::InvalidDate(input.to_string()));
    }
    Ok(date)
}
