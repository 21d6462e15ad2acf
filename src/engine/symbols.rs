use dashmap::DashMap;
use parking_lot::Mutex;

use crate::engine::types::SymbolId;

/// Sentinel returned for ids that were never assigned.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Interns symbol text to compact integer ids.
///
/// Ids are assigned in first-seen order starting at 0 and never reused;
/// the text↔id mapping is injective and stable for the process
/// lifetime. Known symbols are registered at startup, so the steady-state
/// hot path is a lock-free `DashMap` read; only a first sighting takes
/// the assignment mutex.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    ids: DashMap<String, SymbolId>,
    names: Mutex<Vec<String>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `symbol`, assigning the next id on first sight.
    pub fn get_id(&self, symbol: &str) -> SymbolId {
        if let Some(id) = self.ids.get(symbol) {
            return *id;
        }

        // Cold path. The mutex serializes assignment so ids stay dense;
        // re-check under the lock in case another thread won the race.
        let mut names = self.names.lock();
        if let Some(id) = self.ids.get(symbol) {
            return *id;
        }
        let id = names.len() as SymbolId;
        names.push(symbol.to_string());
        self.ids.insert(symbol.to_string(), id);
        id
    }

    /// Return the text for `id`, or [`UNKNOWN_SYMBOL`] if it was never
    /// assigned.
    pub fn get_symbol(&self, id: SymbolId) -> String {
        self.names
            .lock()
            .get(id as usize)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_assigned_in_order() {
        let registry = SymbolRegistry::new();
        assert_eq!(registry.get_id("BTCUSDT"), 0);
        assert_eq!(registry.get_id("ETHBTC"), 1);
        assert_eq!(registry.get_id("ETHUSDT"), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_get_id_is_idempotent() {
        let registry = SymbolRegistry::new();
        let first = registry.get_id("BTCUSDT");
        let second = registry.get_id("BTCUSDT");
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_round_trip() {
        let registry = SymbolRegistry::new();
        for symbol in ["BTCUSDT", "ETHBTC", "ETHUSDT"] {
            let id = registry.get_id(symbol);
            assert_eq!(registry.get_symbol(id), symbol);
        }
    }

    #[test]
    fn test_unknown_id_sentinel() {
        let registry = SymbolRegistry::new();
        assert_eq!(registry.get_symbol(42), UNKNOWN_SYMBOL);
    }

    #[test]
    fn test_concurrent_interning_stays_injective() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(SymbolRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                (0..100)
                    .map(|i| registry.get_id(&format!("SYM{i}")))
                    .collect::<Vec<_>>()
            }));
        }

        let per_thread: Vec<Vec<SymbolId>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Every thread resolved the same id for the same text.
        for ids in &per_thread[1..] {
            assert_eq!(ids, &per_thread[0]);
        }
        let distinct: HashSet<_> = per_thread[0].iter().collect();
        assert_eq!(distinct.len(), 100);
        assert_eq!(registry.len(), 100);
    }
}
