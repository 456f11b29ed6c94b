use std::{env, process::Command};

fn main() {
    emit("TROGGLE_BUILD_TIMESTAMP", &chrono::Utc::now().format("%Y%m%d.%H%M%S").to_string());

    let commit = git(&["rev-parse", "--short=7", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    emit("TROGGLE_GIT_COMMIT", &commit);

    // Any porcelain output means uncommitted changes
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .map(|status| !status.is_empty())
        .unwrap_or(false);
    emit("TROGGLE_GIT_DIRTY", if dirty { "1" } else { "0" });

    emit("TROGGLE_TARGET", &env::var("TARGET").unwrap_or_else(|_| "unknown".to_string()));
    emit("TROGGLE_PROFILE", &env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()));

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}
