use std::process::Command;

/// Short hash of HEAD, with `-dirty` when the work tree has changes
fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?.trim().to_string();

    let dirty = Command::new("git")
        .args(["diff-index", "--quiet", "HEAD"])
        .output()
        .map(|output| !output.status.success())
        .unwrap_or(false);

    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}

fn main() {
    let version = env!("CARGO_PKG_VERSION");
    let profile = std::env::var("PROFILE").unwrap_or_default();

    // Release builds report the crate version, anything else the git revision
    let version_string = if profile == "release" {
        version.to_string()
    } else {
        match git_revision() {
            Some(revision) => format!("{} ({})", version, revision),
            None => version.to_string(),
        }
    };

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rustc-env=VERSION_STRING={}", version_string);
}
