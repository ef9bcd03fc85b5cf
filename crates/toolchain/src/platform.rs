//! Platform detection for release downloads.
//!
//! HashiCorp names its release archives `{tool}_{version}_{os}_{arch}.zip`
//! using Go style operating system and architecture names.
//!
//! # Example
//!
//! ```
//! use toolchain::platform;
//!
//! let platform = platform::detect().expect("unsupported platform");
//! println!("Running on: {}", platform);
//! ```

use crate::error::{Error, Result};
use crate::types::Platform;

/// Detect the current platform.
///
/// | Rust OS   | Release OS | Rust arch | Release arch |
/// |-----------|------------|-----------|--------------|
/// | `linux`   | `linux`    | `x86_64`  | `amd64`      |
/// | `macos`   | `darwin`   | `aarch64` | `arm64`      |
/// | `windows` | `windows`  | `x86`     | `386`        |
/// | `freebsd` | `freebsd`  | `arm`     | `arm`        |
///
/// # Errors
///
/// Returns `Error::UnsupportedPlatform` if the current platform is not supported.
pub fn detect() -> Result<Platform> {
    from_parts(std::env::consts::OS, std::env::consts::ARCH)
}

/// Map Rust OS and architecture names to release names.
pub fn from_parts(os: &str, arch: &str) -> Result<Platform> {
    let unsupported = || Error::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    };

    let release_os = match os {
        "linux" => "linux",
        "macos" => "darwin",
        "windows" => "windows",
        "freebsd" => "freebsd",
        "openbsd" => "openbsd",
        _ => return Err(unsupported()),
    };

    let release_arch = match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        _ => return Err(unsupported()),
    };

    Ok(Platform::new(release_os, release_arch))
}

/// Get the file extension for executables on this platform.
///
/// Returns ".exe" on Windows, empty string on other platforms.
#[must_use]
pub fn executable_extension() -> &'static str {
    if std::env::consts::OS == "windows" {
        ".exe"
    } else {
        ""
    }
}
