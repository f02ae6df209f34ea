#![forbid(unsafe_code)]

use crate::domain::{CaptureDecision, MalformedAnnotation, WorkloadUnit};
use config::Config;

pub trait Reconciler: Send + Sync {
    /// Map an observed unit to its desired capture state. Must be pure.
    fn decide(&self, unit: &WorkloadUnit) -> CaptureDecision;
}

/// Reads the rotation count from a single pod annotation.
#[derive(Debug, Clone)]
pub struct AnnotationReconciler {
    key: String,
}

impl AnnotationReconciler {
    pub fn new(config: &Config) -> Self {
        Self::with_key(config.capture.annotation.clone())
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Reconciler for AnnotationReconciler {
    fn decide(&self, unit: &WorkloadUnit) -> CaptureDecision {
        let Some(value) = unit.annotation(&self.key) else {
            return CaptureDecision::Stop;
        };
        match value.parse::<u32>() {
            Ok(rotations) => CaptureDecision::Start { rotations },
            Err(_) => CaptureDecision::Hold(MalformedAnnotation {
                key: self.key.clone(),
                value: value.to_owned(),
            }),
        }
    }
}
