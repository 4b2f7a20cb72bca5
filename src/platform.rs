//! Platform detection utilities

use std::fs;

/// Detect if running in WSL (Windows Subsystem for Linux)
///
/// Checks /proc/version for a Microsoft kernel and the WSL_DISTRO_NAME
/// environment variable.
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        if kernel_is_wsl(&contents) {
            return true;
        }
    }

    std::env::var("WSL_DISTRO_NAME").is_ok()
}

/// Whether a /proc/version string describes a WSL kernel
fn kernel_is_wsl(version: &str) -> bool {
    let lower = version.to_lowercase();
    lower.contains("microsoft") || lower.contains("wsl")
}
