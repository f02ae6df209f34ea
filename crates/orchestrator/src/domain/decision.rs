#![forbid(unsafe_code)]

use std::fmt;

/// Desired capture state for one workload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureDecision {
    /// Capture with `rotations` output files.
    Start { rotations: u32 },
    /// No capture is desired.
    Stop,
    /// The annotation is present but unusable. Whatever is running is left
    /// alone.
    Hold(MalformedAnnotation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedAnnotation {
    pub key: String,
    pub value: String,
}

impl fmt::Display for MalformedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "annotation {} has value {:?}, expected a non-negative integer",
            self.key, self.value
        )
    }
}
