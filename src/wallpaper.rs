// ============================================================================
// Desktop Wallpaper (NO ADMIN REQUIRED)
// ============================================================================

use std::env;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[cfg(target_os = "windows")]
use crate::error::ApodError;

#[cfg(target_os = "windows")]
use windows::Win32::UI::WindowsAndMessaging::{
    SystemParametersInfoW, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SPI_SETDESKWALLPAPER,
};

/// The desktop API wants an absolute path. `canonicalize` is avoided because
/// on Windows it yields `\\?\` paths that the shell will not load.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

#[cfg(target_os = "windows")]
pub fn set_wallpaper(image_path: &Path) -> Result<()> {
    let path = absolute_path(image_path)?;
    let mut path_wide: Vec<u16> = path
        .to_str()
        .ok_or_else(|| ApodError::Wallpaper(format!("path is not valid Unicode: {}", path.display())))?
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        SystemParametersInfoW(
            SPI_SETDESKWALLPAPER,
            0,
            Some(path_wide.as_mut_ptr().cast()),
            SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
        )
        .map_err(|e| ApodError::Wallpaper(e.to_string()))?;
    }
    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn set_wallpaper(_image_path: &Path) -> Result<()> {
    Err(crate::error::ApodError::Unsupported("Setting the wallpaper"))
}
