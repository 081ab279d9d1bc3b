use std::process::Command;
use vergen::EmitBuilder;

fn main() {
    let is_git_available = Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);

    let mut builder = EmitBuilder::builder();
    builder.build_timestamp();
    if is_git_available {
        builder.git_sha(true);
    }

    // Build metadata is informational only; the crate reads it through `option_env!`.
    if let Err(e) = builder.emit() {
        println!("cargo:warning=Unable to generate build metadata: {e}");
    }
}
