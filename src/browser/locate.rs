//! Chromium Executable Lookup
//!
//! Finds a Chromium-family browser that speaks the DevTools protocol.
//! Supports macOS, Linux, and Windows.

use std::path::PathBuf;

/// Environment variable that overrides the lookup.
pub const CHROME_ENV: &str = "MATHCHECK_CHROME";

/// Executable names searched in `PATH`, most likely first.
const PATH_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "brave-browser",
    "microsoft-edge",
    "msedge",
];

/// Locate a browser executable.
///
/// Order: `MATHCHECK_CHROME`, then `PATH`, then well-known install locations.
#[must_use]
pub fn locate_chrome() -> Option<PathBuf> {
    from_env().or_else(from_path).or_else(from_install_dirs)
}

fn from_env() -> Option<PathBuf> {
    std::env::var_os(CHROME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn from_path() -> Option<PathBuf> {
    PATH_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
}

#[cfg(target_os = "macos")]
fn from_install_dirs() -> Option<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

#[cfg(target_os = "windows")]
fn from_install_dirs() -> Option<PathBuf> {
    let roots = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"];
    let suffixes = [
        r"Google\Chrome\Application\chrome.exe",
        r"Chromium\Application\chrome.exe",
        r"Microsoft\Edge\Application\msedge.exe",
    ];
    roots
        .iter()
        .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
        .flat_map(|root| suffixes.iter().map(move |s| root.join(s)))
        .find(|p| p.exists())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn from_install_dirs() -> Option<PathBuf> {
    [
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/snap/bin/chromium",
        "/opt/google/chrome/chrome",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}
