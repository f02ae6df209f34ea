#![forbid(unsafe_code)]

mod decision;
mod unit;

pub use decision::{CaptureDecision, MalformedAnnotation};
pub use unit::{ContainerStatus, UnitId, WorkloadUnit};
