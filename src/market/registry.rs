//! Static bookmaker registry

use super::BookmakerRegistry;
use crate::config::BookmakerConfig;
use std::collections::HashMap;

/// Registry built from the `[[bookmakers]]` configuration table
#[derive(Debug, Clone, Default)]
pub struct StaticBookmakerRegistry {
    /// Bookmakers keyed by exchange identifier
    by_exchange: HashMap<String, BookmakerConfig>,
}

impl StaticBookmakerRegistry {
    /// Create a registry from configured bookmakers
    pub fn new(bookmakers: impl IntoIterator<Item = BookmakerConfig>) -> Self {
        let by_exchange = bookmakers
            .into_iter()
            .map(|b| (b.exchange.clone(), b))
            .collect();
        Self { by_exchange }
    }

    /// Number of known bookmakers
    pub fn len(&self) -> usize {
        self.by_exchange.len()
    }

    /// Whether no bookmakers are known
    pub fn is_empty(&self) -> bool {
        self.by_exchange.is_empty()
    }
}

impl BookmakerRegistry for StaticBookmakerRegistry {
    fn resolve(&self, exchange: &str) -> Option<BookmakerConfig> {
        self.by_exchange.get(exchange).cloned()
    }

    fn generate_rotation_number(
        &self,
        bookmaker_id: &str,
        sport: &str,
        sequence: u32,
    ) -> Option<String> {
        let bookmaker = self.by_exchange.values().find(|b| b.id == bookmaker_id)?;
        let base = bookmaker.rotation_bases.get(sport)?;
        base.checked_add(sequence).map(|n| n.to_string())
    }
}
