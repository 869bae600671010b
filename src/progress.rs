// ============================================================================
// Terminal Progress - download bar and request spinner
// ============================================================================

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use colored::*;

const BAR_WIDTH: usize = 30;
const MAX_SUFFIX_LEN: usize = 35;
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Console Capability Detection
// ============================================================================

/// Windows 11 is build 22000 or greater; older consoles mangle Braille glyphs
#[cfg(target_os = "windows")]
fn is_windows_11_or_greater() -> bool {
    use std::process::Command;

    if let Ok(output) = Command::new("cmd")
        .args(["/C", "reg query \"HKLM\\SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\" /v CurrentBuild"])
        .output()
    {
        let output_str = String::from_utf8_lossy(&output.stdout);
        // "CurrentBuild    REG_SZ    22631"
        if let Some(build) = output_str
            .lines()
            .find(|line| line.contains("CurrentBuild"))
            .and_then(|line| line.split_whitespace().last())
            .and_then(|build| build.parse::<u32>().ok())
        {
            return build >= 22000;
        }
    }

    true
}

#[cfg(not(target_os = "windows"))]
fn is_windows_11_or_greater() -> bool {
    true
}

pub fn spinner_chars() -> Vec<char> {
    if is_windows_11_or_greater() {
        vec!['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏']
    } else {
        vec!['|', '/', '-', '\\']
    }
}

// ============================================================================
// Progress Bar
// ============================================================================

thread_local! {
    static SPINNER_FRAME: Cell<usize> = const { Cell::new(0) };
    static LAST_SPINNER_UPDATE: RefCell<Option<Instant>> = const { RefCell::new(None) };
    static SPINNER_SET: RefCell<Option<Vec<char>>> = const { RefCell::new(None) };
}

/// Print a progress bar with animated spinner: ⠋ Downloading [----      ] 40% 1.2 MB / 3.0 MB
pub fn print_progress_bar(current: u64, total: u64, prefix: &str, suffix: &str) {
    if total == 0 {
        return;
    }

    let spinner = SPINNER_SET.with(|set| {
        let mut set = set.borrow_mut();
        let chars = set.get_or_insert_with(spinner_chars);
        let idx = advance_frame(chars.len());
        chars[idx]
    });

    print!(
        "\r{} {} [{}] {}% {}",
        spinner.to_string().cyan(),
        prefix.cyan(),
        render_bar(current, total),
        percent(current, total).to_string().bright_green(),
        truncate(suffix, MAX_SUFFIX_LEN)
    );
    io::stdout().flush().ok();
}

pub fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    io::stdout().flush().ok();
}

// Spinner advances at most every ~100ms regardless of how often chunks arrive
fn advance_frame(len: usize) -> usize {
    SPINNER_FRAME.with(|frame| {
        LAST_SPINNER_UPDATE.with(|last_update| {
            let mut last = last_update.borrow_mut();
            let now = Instant::now();
            let should_advance = match *last {
                None => {
                    *last = Some(now);
                    false
                }
                Some(prev) if now.duration_since(prev) >= FRAME_INTERVAL => {
                    *last = Some(now);
                    true
                }
                Some(_) => false,
            };
            if should_advance {
                frame.set((frame.get() + 1) % len);
            }
            frame.get() % len
        })
    })
}

fn percent(current: u64, total: u64) -> u32 {
    let ratio = (current as f64 / total as f64).min(1.0);
    (ratio * 100.0) as u32
}

fn render_bar(current: u64, total: u64) -> String {
    let ratio = (current as f64 / total as f64).min(1.0);
    let filled = (ratio * BAR_WIDTH as f64) as usize;
    "-".repeat(filled) + &" ".repeat(BAR_WIDTH - filled)
}

// Long suffixes wrap the line and break the `\r` redraw
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

// ============================================================================
// Spinner - animates while a blocking request is in flight
// ============================================================================
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    chars: Vec<char>,
}

impl Spinner {
    pub fn new() -> Self {
        Spinner {
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            chars: spinner_chars(),
        }
    }

    pub fn start(&mut self, message: &str) {
        self.stop();

        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Relaxed);

        let msg = message.to_string();
        let frames = self.chars.clone();
        let start_time = Instant::now();

        self.handle = Some(thread::spawn(move || {
            let mut i = 0;
            while running.load(Ordering::Relaxed) {
                print!(
                    "\r{} {}... {:.1}s",
                    frames[i % frames.len()].to_string().cyan(),
                    msg.cyan(),
                    start_time.elapsed().as_secs_f64()
                );
                io::stdout().flush().ok();

                thread::sleep(FRAME_INTERVAL);
                i += 1;
            }
            print!("\r{}\r", " ".repeat(80));
            io::stdout().flush().ok();
        }));
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }

    pub fn complete(&mut self, message: &str) {
        self.stop();
        println!("{} {}", "✓".green(), message.green());
    }

    pub fn error(&mut self, message: &str) {
        self.stop();
        println!("{} {}", "[ ERROR ]".red(), message.red());
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}
