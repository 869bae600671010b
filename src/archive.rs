// ============================================================================
// Archive - move earlier pictures out of the working directory
// ============================================================================

use std::fs;
use std::path::Path;

use colored::*;

use crate::error::{ApodError, Result};

const IMAGE_EXTENSION: &str = ".jpg";

#[derive(Debug, Default, PartialEq)]
pub struct ArchiveReport {
    pub created_dir: bool,
    pub archived: Vec<String>,
    /// Already present in the archive under the same name
    pub skipped: Vec<String>,
}

/// Move every `.jpg` in `dir` except `keep` into `dir/<archive_name>`.
pub fn archive_old_images(dir: &Path, keep: &str, archive_name: &str) -> Result<ArchiveReport> {
    let archive_dir = dir.join(archive_name);
    let mut report = ArchiveReport::default();

    match fs::metadata(&archive_dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(ApodError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("'{}' exists and is not a directory", archive_dir.display()),
            )));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir(&archive_dir)?;
            println!("{}", format!("✓ Created directory '{}'", archive_name).green());
            report.created_dir = true;
        }
        Err(e) => return Err(e.into()),
    }

    let mut candidates: Vec<String> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        // Names that aren't valid UTF-8 were not written by us
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name != keep && name.ends_with(IMAGE_EXTENSION) {
            candidates.push(name);
        }
    }
    candidates.sort();

    for name in candidates {
        let destination = archive_dir.join(&name);
        if destination.exists() {
            println!("{}", format!("! '{}' is already archived, left in place", name).cyan());
            report.skipped.push(name);
            continue;
        }

        fs::rename(dir.join(&name), &destination)?;
        println!("{}", format!("✓ Archived '{}'", name).green());
        report.archived.push(name);
    }

    Ok(report)
}
