use std::process::Command;

const OVERRIDE: &str = "TRACKER_BUILD_COMMIT";

fn main() {
    println!("cargo::rerun-if-changed=../../.git/HEAD");
    println!("cargo::rerun-if-changed=../../.git/refs/heads/");
    println!("cargo::rerun-if-env-changed={}", OVERRIDE);

    // Packaged builds have no .git and pass the commit in
    let commit = std::env::var(OVERRIDE)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(git_commit)
        .unwrap_or_else(|| "untracked".to_string());

    println!("cargo::rustc-env=TRACKER_BUILD_COMMIT={}", commit);
}

fn git_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!commit.is_empty()).then_some(commit)
}
