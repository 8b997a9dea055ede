use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

const COMMON_INSTALL_DIRS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];

/// Returns the directory for a bundled Tesseract install.
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("price-watcher")
        .join("tesseract")
}

/// Finds the Tesseract executable, checking our local dir first, then PATH,
/// then the standard install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for dir in COMMON_INSTALL_DIRS {
        let p = Path::new(dir).join("tesseract.exe");
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR and add it to PATH, or copy it to {}",
        get_tesseract_dir().display()
    ))
}

/// Finds a tessdata directory holding `eng.traineddata`.
///
/// `None` lets Tesseract fall back to its compiled-in location.
pub fn find_tessdata_dir() -> Option<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];
    candidates.extend(
        COMMON_INSTALL_DIRS
            .iter()
            .map(|dir| Path::new(dir).join("tessdata")),
    );
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }
    first_tessdata_dir(&candidates)
}

fn first_tessdata_dir(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| dir.join("eng.traineddata").exists())
        .cloned()
}
