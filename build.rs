//! Build script for the persona engine
//!
//! Embeds the git revision, build timestamp and target triple so that
//! `persona-engine version` and the startup log can identify a deployment.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = git(&["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let git_branch =
        git(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let git_dirty = match git(&["status", "--porcelain"]) {
        Some(out) if !out.is_empty() => "true",
        Some(_) => "false",
        None => "unknown",
    };

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let rustc_version = Command::new("rustc")
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=PERSONA_ENGINE_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=PERSONA_ENGINE_GIT_BRANCH={}", git_branch);
    println!("cargo:rustc-env=PERSONA_ENGINE_GIT_DIRTY={}", git_dirty);
    println!("cargo:rustc-env=PERSONA_ENGINE_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=PERSONA_ENGINE_TARGET={}", target);
    println!("cargo:rustc-env=PERSONA_ENGINE_PROFILE={}", profile);
    println!("cargo:rustc-env=PERSONA_ENGINE_RUSTC_VERSION={}", rustc_version);
}

/// Run a git command and return its trimmed stdout, if it succeeded.
fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}
