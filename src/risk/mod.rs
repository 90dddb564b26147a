//! Risk control module
//!
//! Per-relationship circuit breakers, post-fill adverse move monitoring,
//! and the daily loss limit

mod adverse;
mod alert;
mod circuit_breaker;
mod daily_loss;
mod health;

pub use adverse::{AdverseMoveEvent, AdverseMoveHandler, AdverseMoveMonitor, PostFillTracker};
pub use alert::{AlertKind, AlertSink, TracingAlertSink};
pub use circuit_breaker::{BreakerState, BreakerStatus, RelationshipCircuitBreaker};
pub use daily_loss::{DailyLossStatus, DailyLossTracker};
pub use health::{ExecutionGapMonitor, SystemicHealthMonitor};
