#![forbid(unsafe_code)]

use crate::domain::WorkloadUnit;
use crate::error::Error;
use crate::locator::{ProcessLocator, container_id};
use config::Config;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Finds a container's processes by their cgroup membership.
///
/// Container runtimes put the container id into the cgroup path of every
/// process they start for it, so a substring match on
/// `<proc_root>/<pid>/cgroup` is enough.
#[derive(Debug, Clone)]
pub struct ProcfsLocator {
    proc_root: PathBuf,
}

impl ProcfsLocator {
    pub fn new(config: &Config) -> Self {
        Self::with_root(config.capture.proc_root.clone())
    }

    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    fn pids(&self) -> Result<Vec<i32>, Error> {
        let mut pids = Vec::new();
        for process in procfs::process::all_processes_with_root(&self.proc_root)? {
            match process {
                Ok(process) => pids.push(process.pid),
                // Processes may exit while the tree is being walked.
                Err(err) => trace!(?err, "skipping process entry"),
            }
        }
        pids.sort_unstable();
        Ok(pids)
    }
}

impl ProcessLocator for ProcfsLocator {
    fn resolve(&self, unit: &WorkloadUnit) -> Result<u32, Error> {
        let id = container_id(unit)?;

        for pid in self.pids()? {
            let Ok(host_pid) = u32::try_from(pid) else {
                continue;
            };
            let path = self.proc_root.join(pid.to_string()).join("cgroup");
            let cgroup = match std::fs::read_to_string(&path) {
                Ok(cgroup) => cgroup,
                Err(err) => {
                    trace!(pid, %err, "cgroup not readable");
                    continue;
                }
            };
            if cgroup.contains(id) {
                debug!(uid = %unit.id, pod = %unit.name, pid, "resolved pod process");
                return Ok(host_pid);
            }
        }

        Err(Error::PidNotFound {
            container_id: id.to_owned(),
        })
    }
}
