use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, PlaybookConfig};

use super::traits::StrategyRunner;

/// The set of registered strategies, looked up by name and iterated in
/// priority order (lower priority number runs earlier) each cycle.
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn StrategyRunner>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry {
            strategies: HashMap::new(),
        }
    }

    pub fn register(&mut self, strategy: Arc<dyn StrategyRunner>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    /// Strategies whose playbook config marks them enabled, ordered by
    /// ascending priority (lower runs earlier) and then by name for a stable
    /// tie-break.
    pub fn enabled_in_priority_order(&self, config: &Config) -> Vec<Arc<dyn StrategyRunner>> {
        let default_config = PlaybookConfig::default();
        let playbook_for = |s: &Arc<dyn StrategyRunner>| config.strategies.get(s.name()).unwrap_or(&default_config);

        let mut enabled: Vec<_> = self
            .strategies
            .values()
            .filter(|s| s.is_enabled(playbook_for(s)))
            .cloned()
            .collect();
        enabled.sort_by(|a, b| {
            a.priority(playbook_for(a))
                .cmp(&b.priority(playbook_for(b)))
                .then_with(|| a.name().cmp(b.name()))
        });
        enabled
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StrategyRunner>> {
        self.strategies.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
