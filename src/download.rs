// ============================================================================
// Image Download
// ============================================================================

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use colored::*;
use reqwest::blocking::Client;

use crate::apod::ApodEntry;
use crate::error::{ApodError, Result};
use crate::progress::{clear_progress_line, format_bytes, print_progress_bar};

// Characters Windows refuses in file names
const FORBIDDEN_CHARACTERS: &str = "\\/:*?\"<>|";
const PARTIAL_SUFFIX: &str = ".part";
const CHUNK_SIZE: usize = 8192;

#[derive(Debug, PartialEq)]
pub enum Downloaded {
    /// Already on disk from an earlier run
    Existing(String),
    Fetched { file_name: String, bytes: u64 },
}

impl Downloaded {
    pub fn file_name(&self) -> &str {
        match self {
            Downloaded::Existing(name) => name,
            Downloaded::Fetched { file_name, .. } => file_name,
        }
    }
}

pub fn sanitize_file_name(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !FORBIDDEN_CHARACTERS.contains(*c) && !c.is_control())
        .collect();
    stripped.trim_end_matches(['.', ' ']).to_string()
}

/// "[2024-03-14] Galaxy M101.jpg"
pub fn image_file_name(entry: &ApodEntry) -> String {
    sanitize_file_name(&format!("[{}] {}.jpg", entry.date, entry.title))
}

/// Download today's image into `dir` unless it is already there
pub fn download_image(client: &Client, entry: &ApodEntry, dir: &Path) -> Result<Downloaded> {
    let file_name = image_file_name(entry);
    let target = dir.join(&file_name);

    if target.is_file() {
        println!("{}", "! Image already downloaded, skipped".cyan());
        return Ok(Downloaded::Existing(file_name));
    }
    if target.exists() {
        return Err(ApodError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("'{}' exists and is not a file", target.display()),
        )));
    }

    let response = client.get(entry.image_url()).send()?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);

    let partial = partial_path(&target);
    // Left behind by an interrupted run
    if partial.exists() {
        fs::remove_file(&partial)?;
    }
    let bytes = match write_with_progress(response, total, &partial) {
        Ok(bytes) => bytes,
        Err(e) => {
            fs::remove_file(&partial).ok();
            return Err(e);
        }
    };

    // Lost a race with another run: keep theirs
    if target.exists() {
        fs::remove_file(&partial).ok();
        println!("{}", "! Image already downloaded, skipped".cyan());
        return Ok(Downloaded::Existing(file_name));
    }
    fs::rename(&partial, &target)?;

    println!(
        "{}",
        format!("✓ Image downloaded as '{}' ({})", file_name, format_bytes(bytes)).green()
    );
    Ok(Downloaded::Fetched { file_name, bytes })
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

/// Stream `reader` into a freshly created `dest`, drawing a progress bar when
/// the total size is known. Returns the number of bytes written.
pub fn write_with_progress<R: Read>(reader: R, total: u64, dest: &Path) -> Result<u64> {
    let file = File::options().write(true).create_new(true).open(dest)?;
    copy_with_progress(reader, BufWriter::new(file), total)
}

// The progress line is cleared on every exit so errors print on a clean line
fn copy_with_progress<R: Read, W: Write>(mut reader: R, mut writer: W, total: u64) -> Result<u64> {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                clear_progress_line();
                return Err(ApodError::Io(e));
            }
        };
        if let Err(e) = writer.write_all(&chunk[..n]) {
            clear_progress_line();
            return Err(ApodError::Io(e));
        }
        written += n as u64;

        if total > 0 {
            let suffix = format!("{} / {}", format_bytes(written), format_bytes(total));
            print_progress_bar(written, total, "Downloading image", &suffix);
        }
    }

    let flushed = writer.flush();
    if total > 0 {
        clear_progress_line();
    }
    flushed?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apod::MediaType;
    use crate::test_support::{local_client, serve_once};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn entry(date: &str, title: &str) -> ApodEntry {
        ApodEntry {
            date: date.to_string(),
            title: title.to_string(),
            explanation: String::new(),
            // Unroutable: a test that reaches the network fails fast
            url: "http://127.0.0.1:9/image.jpg".to_string(),
            hdurl: None,
            media_type: MediaType::Image,
            copyright: None,
            thumbnail_url: None,
        }
    }

    #[test]
    fn test_sanitize_removes_forbidden() {
        assert_eq!(sanitize_file_name(r#"a\b/c:d*e?f"g<h>i|j"#), "abcdefghij");
        assert_eq!(sanitize_file_name("tab\there"), "tabhere");
        assert_eq!(sanitize_file_name("Trailing dots... "), "Trailing dots");
        assert_eq!(sanitize_file_name("[2024-01-01] M31.jpg"), "[2024-01-01] M31.jpg");
    }

    #[test]
    fn test_image_file_name() {
        let e = entry("2024-03-14", "Galaxy: M/101?");
        assert_eq!(image_file_name(&e), "[2024-03-14] Galaxy M101.jpg");
    }

    #[test]
    fn test_existing_file_skips_download() {
        let dir = tempdir().unwrap();
        let e = entry("2024-03-14", "Pillars");
        let name = image_file_name(&e);
        fs::write(dir.path().join(&name), b"cached").unwrap();

        let client = Client::new();
        let result = download_image(&client, &e, dir.path()).unwrap();
        assert_eq!(result, Downloaded::Existing(name.clone()));
        assert_eq!(result.file_name(), name);
        assert_eq!(fs::read(dir.path().join(&name)).unwrap(), b"cached");
    }

    #[test]
    fn test_failed_download_leaves_no_files() {
        let dir = tempdir().unwrap();
        let e = entry("2024-03-15", "Unreachable");

        let client = local_client();
        assert!(download_image(&client, &e, dir.path()).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn entry_at(date: &str, title: &str, url: String) -> ApodEntry {
        ApodEntry { url, ..entry(date, title) }
    }

    #[test]
    fn test_download_writes_image() {
        let dir = tempdir().unwrap();
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let e = entry_at("2024-03-16", "Nebula", serve_once("200 OK", "image/jpeg", data.clone()));

        let result = download_image(&local_client(), &e, dir.path()).unwrap();
        let name = image_file_name(&e);
        assert_eq!(result, Downloaded::Fetched { file_name: name.clone(), bytes: 50_000 });
        assert_eq!(fs::read(dir.path().join(&name)).unwrap(), data);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(leftovers, vec![name]);
    }

    #[test]
    fn test_download_replaces_stale_partial() {
        let dir = tempdir().unwrap();
        let e = entry_at("2024-03-17", "Comet", serve_once("200 OK", "image/jpeg", b"fresh".to_vec()));
        let name = image_file_name(&e);
        fs::write(dir.path().join(format!("{}{}", name, PARTIAL_SUFFIX)), b"stale").unwrap();

        download_image(&local_client(), &e, dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join(&name)).unwrap(), b"fresh");
        assert!(!dir.path().join(format!("{}{}", name, PARTIAL_SUFFIX)).exists());
    }

    #[test]
    fn test_http_error_leaves_no_files() {
        let dir = tempdir().unwrap();
        let e = entry_at("2024-03-18", "Missing", serve_once("404 Not Found", "text/plain", b"gone".to_vec()));

        let err = download_image(&local_client(), &e, dir.path()).unwrap_err();
        assert!(matches!(err, ApodError::Http(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_directory_in_the_way() {
        let dir = tempdir().unwrap();
        let e = entry("2024-03-19", "Blocked");
        let name = image_file_name(&e);
        fs::create_dir(dir.path().join(&name)).unwrap();

        let err = download_image(&local_client(), &e, dir.path()).unwrap_err();
        assert!(matches!(err, ApodError::Io(_)));
        assert!(dir.path().join(&name).is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_with_progress() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.jpg.part");
        let data = vec![7u8; CHUNK_SIZE * 2 + 100];

        let written = write_with_progress(Cursor::new(data.clone()), data.len() as u64, &dest).unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), data);
    }

    #[test]
    fn test_write_with_unknown_length() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.jpg.part");

        let written = write_with_progress(Cursor::new(b"abc".to_vec()), 0, &dest).unwrap();
        assert_eq!(written, 3);
    }

    // Accepts `limit` bytes, then fails like a full disk
    struct FullDisk {
        limit: usize,
        taken: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.taken >= self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            let n = buf.len().min(self.limit - self.taken);
            self.taken += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_midway() {
        let data = vec![1u8; CHUNK_SIZE * 3];
        let disk = FullDisk { limit: CHUNK_SIZE + 10, taken: 0 };

        let err = copy_with_progress(Cursor::new(data.clone()), disk, data.len() as u64).unwrap_err();
        match err {
            ApodError::Io(e) => assert_eq!(e.to_string(), "no space left on device"),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_never_overwrites() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("keep.jpg");
        fs::write(&dest, b"original").unwrap();

        let err = write_with_progress(Cursor::new(b"new".to_vec()), 3, &dest).unwrap_err();
        assert!(matches!(err, ApodError::Io(_)));
        assert_eq!(fs::read(&dest).unwrap(), b"original");
    }

    #[test]
    fn test_partial_path() {
        let p = partial_path(Path::new("/x/[2024-01-01] A.jpg"));
        assert_eq!(p, PathBuf::from("/x/[2024-01-01] A.jpg.part"));
    }
}
