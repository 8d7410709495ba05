//! Build identification for lifeline-dash startup logging
//!
//! Exposes `GIT_HASH` (with a `-dirty` suffix for uncommitted changes),
//! `BUILD_TIMESTAMP` (RFC 3339, UTC) and `BUILD_PROFILE` to the binary.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let git_hash = match git(&["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .map(|status| !status.is_empty())
                .unwrap_or(false);
            if dirty {
                format!("{}-dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    };

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
}
