use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Capture {
    /// Pod annotation that requests a capture. Its value is the number of
    /// rotation files the capture tool cycles through, as a base-10
    /// non-negative integer.
    pub annotation: String,

    /// Directory the capture files are written to. Every capture writes
    /// `capture-<pod name>.pcap` here, and the capture tool appends its own
    /// rotation suffixes.
    ///
    /// # Note
    ///
    /// Files matching `capture-<pod name>.pcap*` in this directory are
    /// deleted when the capture is stopped. Do not point this at a directory
    /// holding anything else with that naming.
    pub capture_dir: PathBuf,

    /// Root of the host process tree. Inside a DaemonSet this is usually the
    /// host's `/proc` mounted at `/host/proc`.
    pub proc_root: PathBuf,

    /// Program used to enter the target network namespace.
    pub nsenter: PathBuf,

    /// Packet capture program, executed inside the target namespace.
    pub tcpdump: PathBuf,

    /// User the capture program keeps its privileges as (`-Z`).
    pub user: String,

    /// Size of a single rotation file, in millions of bytes (`-C`).
    pub file_size: u32,

    /// How long a cancelled capture may take to exit after SIGTERM before it
    /// is killed. **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub stop_grace: Duration,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            annotation: "tcpdump.antrea.io".into(),
            capture_dir: PathBuf::from("/"),
            proc_root: PathBuf::from("/host/proc"),
            nsenter: PathBuf::from("nsenter"),
            tcpdump: PathBuf::from("tcpdump"),
            user: "root".into(),
            file_size: 1,
            stop_grace: Duration::from_secs(5),
        }
    }
}
