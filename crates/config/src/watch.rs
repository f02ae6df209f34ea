use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Watch {
    /// Delay before the pod watch is re-established after it failed or
    /// ended. **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub backoff: Duration,
}

impl Default for Watch {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(5),
        }
    }
}
