//! Stream processing module
//!
//! Runs detection and risk control over paired market streams and reports
//! aggregate health.

mod report;
mod risk_control;
mod service;

pub use report::{HealthReport, ProcessorMetrics};
pub use risk_control::RiskControlProcessor;
pub use service::{RiskControlHandle, RiskControlService, ServiceError};
