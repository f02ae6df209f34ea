#![forbid(unsafe_code)]

use crate::error::Error;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Path the capture tool writes to. It appends rotation suffixes itself.
pub fn artifact_path(capture_dir: &Path, name: &str) -> PathBuf {
    capture_dir.join(format!("capture-{name}.pcap"))
}

/// Glob matching every rotation file of a capture.
pub fn artifact_pattern(capture_dir: &Path, name: &str) -> String {
    let dir = Pattern::escape(&capture_dir.to_string_lossy());
    let file = format!("capture-{}.pcap*", Pattern::escape(name));
    Path::new(&dir).join(file).to_string_lossy().into_owned()
}

/// Delete all rotation files of a capture. Best-effort: failures are
/// logged and skipped. Returns the paths that were removed.
pub fn remove_artifacts(capture_dir: &Path, name: &str) -> Result<Vec<PathBuf>, Error> {
    let pattern = artifact_pattern(capture_dir, name);
    let mut removed = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!(%err, "failed to inspect capture file");
                continue;
            }
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "deleted capture file");
                removed.push(path);
            }
            Err(err) => warn!(path = %path.display(), %err, "failed to delete capture file"),
        }
    }
    Ok(removed)
}
