use std::env;
#[cfg(windows)]
use std::path::Path;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::{info, warn};

pub const YT_DLP_BINARY: &str = "yt-dlp";
pub const FFMPEG_BINARY: &str = "ffmpeg";

/// Directories searched for bundled tools before falling back to `PATH`:
///   1. `<exe_dir>/`
///   2. `<exe_dir>/bin/`
///   3. `<exe_dir>/../bin/`
///   4. `<cwd>/`
///   5. `<cwd>/bin/`
fn candidate_bin_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(exe) = env::current_exe().and_then(|p| p.canonicalize()) {
        if let Some(exe_dir) = exe.parent() {
            dirs.push(exe_dir.to_path_buf());
            dirs.push(exe_dir.join("bin"));
            if let Some(parent) = exe_dir.parent() {
                dirs.push(parent.join("bin"));
            }
        }
    }

    if let Ok(cwd) = env::current_dir() {
        if !dirs.contains(&cwd) {
            dirs.push(cwd.clone());
        }
        let cwd_bin = cwd.join("bin");
        if !dirs.contains(&cwd_bin) {
            dirs.push(cwd_bin);
        }
    }

    dirs
}

#[cfg(unix)]
fn candidate_binary_names(binary: &str) -> Vec<String> {
    vec![binary.to_string()]
}

#[cfg(windows)]
fn candidate_binary_names(binary: &str) -> Vec<String> {
    if Path::new(binary).components().count() > 1 {
        return vec![binary.to_string()];
    }

    let lower = binary.to_ascii_lowercase();
    if lower.ends_with(".exe") || lower.ends_with(".cmd") || lower.ends_with(".bat") {
        return vec![binary.to_string()];
    }

    vec![format!("{binary}.exe"), binary.to_string()]
}

fn find_binary_in_dirs(binary: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let names = candidate_binary_names(binary);
    for dir in dirs {
        for name in &names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Resolve a bundled copy of `binary` if one exists.
pub fn locate_binary(binary: &str) -> Option<PathBuf> {
    find_binary_in_dirs(binary, &candidate_bin_dirs())
}

/// Async command for an external tool; the child is killed if the command
/// future is dropped (e.g. on timeout).
pub fn command_for(binary: &str) -> Command {
    let program = locate_binary(binary).unwrap_or_else(|| PathBuf::from(binary));
    let mut command = Command::new(program);
    command.kill_on_drop(true);
    command
}

/// Log where the external conversion tools will be taken from.
pub fn log_tool_status() {
    for binary in [YT_DLP_BINARY, FFMPEG_BINARY] {
        match locate_binary(binary) {
            Some(path) => info!(tool = binary, path = %path.display(), "Using bundled tool"),
            None if is_on_path(binary) => info!(tool = binary, "Using tool from PATH"),
            None => warn!(
                tool = binary,
                "Tool not found next to the executable or on PATH; conversions will fail"
            ),
        }
    }
}

fn is_on_path(binary: &str) -> bool {
    let Some(path) = env::var_os("PATH") else {
        return false;
    };
    let dirs: Vec<PathBuf> = env::split_paths(&path).collect();
    find_binary_in_dirs(binary, &dirs).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_binary_in_first_matching_dir() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let name = candidate_binary_names("fake-tool")[0].clone();
        std::fs::write(second.path().join(&name), b"").unwrap();

        let found = find_binary_in_dirs(
            "fake-tool",
            &[first.path().to_path_buf(), second.path().to_path_buf()],
        );
        assert_eq!(found, Some(second.path().join(name)));
    }

    #[test]
    fn missing_binary_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(
            find_binary_in_dirs("definitely-not-here", &[dir.path().to_path_buf()]),
            None
        );
    }

    #[test]
    fn directories_are_not_mistaken_for_binaries() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ffmpeg")).unwrap();
        assert_eq!(find_binary_in_dirs("ffmpeg", &[dir.path().to_path_buf()]), None);
    }
}
