//! Records the git commit and dirty state for `build_info`.

use std::process::{Command, Output};

fn git(args: &[&str]) -> Option<Output> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    let hash = git(&["rev-parse", "--short=7", "HEAD"])
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string());
    println!("cargo:rustc-env=BUILD_HASH={hash}");

    let dirty = git(&["status", "--porcelain"]).is_some_and(|o| !o.stdout.is_empty());
    println!("cargo:rustc-env=BUILD_DIRTY={dirty}");
}
