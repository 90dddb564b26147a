//! Market data module
//!
//! Validated cross-market ticks and exchange to bookmaker resolution

mod registry;
mod types;

pub use registry::StaticBookmakerRegistry;
pub use types::{Odds, Tick, TickError};

use crate::config::BookmakerConfig;

/// Trait for resolving exchanges to bookmakers
///
/// Resolved identifiers only label opportunities; they never drive risk decisions.
pub trait BookmakerRegistry: Send + Sync {
    /// Look up the bookmaker behind an exchange identifier
    fn resolve(&self, exchange: &str) -> Option<BookmakerConfig>;
    /// Sport-specific rotation number for a bookmaker
    fn generate_rotation_number(
        &self,
        bookmaker_id: &str,
        sport: &str,
        sequence: u32,
    ) -> Option<String>;
}
