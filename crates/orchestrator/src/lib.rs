#![forbid(unsafe_code)]

pub mod capture;
pub mod controller;
pub mod domain;
pub mod error;
pub mod locator;
pub mod manager;
pub mod reconciler;
pub mod source;

pub use capture::{CaptureLauncher, CaptureOutcome, CaptureSpec, NsenterLauncher};
pub use controller::{ControlEvent, Controller, Services};
pub use domain::{CaptureDecision, ContainerStatus, MalformedAnnotation, UnitId, WorkloadUnit};
pub use error::Error;
pub use locator::{ProcessLocator, ProcfsLocator};
pub use manager::{CaptureDescriptor, CaptureManager};
pub use reconciler::{AnnotationReconciler, Reconciler};
pub use source::{PodWatcher, UnitEvent};
