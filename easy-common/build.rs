//! Captures build identification for `easy_common::build_info`
//!
//! Every sample service links easy-common, so the workspace records it once
//! here instead of in each binary crate.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string()).filter(|s| !s.is_empty())
}

fn main() {
    let revision = git(&["describe", "--always", "--dirty=+"]).unwrap_or_else(|| "unknown".into());
    let built_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    println!("cargo:rustc-env=EASY_GIT_REVISION={}", revision);
    println!("cargo:rustc-env=EASY_BUILD_TIMESTAMP={}", built_at);
    println!(
        "cargo:rustc-env=EASY_BUILD_PROFILE={}",
        std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into())
    );
}
