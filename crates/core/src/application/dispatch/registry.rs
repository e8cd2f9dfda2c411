// Queue Registry: one grouped queue plus its config per category

use std::sync::Arc;

use crate::domain::{PerCategory, QueueCategory, QueueConfig};
use crate::error::{AppError, Result};
use crate::port::GroupedQueue;

pub struct QueueBinding {
    pub config: QueueConfig,
    pub queue: Arc<dyn GroupedQueue>,
}

impl QueueBinding {
    pub fn new(config: QueueConfig, queue: Arc<dyn GroupedQueue>) -> Self {
        Self { config, queue }
    }
}

/// Built once in the composition root, immutable afterwards
pub struct QueueRegistry {
    bindings: PerCategory<QueueBinding>,
}

impl QueueRegistry {
    pub fn new(bindings: PerCategory<QueueBinding>) -> Result<Self> {
        for (slot, binding) in bindings.iter() {
            if binding.config.category != slot || binding.queue.category() != slot {
                return Err(AppError::Config(format!(
                    "queue bound to slot \"{slot}\" serves \"{}\" with config for \"{}\"",
                    binding.queue.category(),
                    binding.config.category
                )));
            }
            binding.config.validate()?;
        }
        Ok(Self { bindings })
    }

    pub fn queue(&self, category: QueueCategory) -> &Arc<dyn GroupedQueue> {
        &self.bindings.get(category).queue
    }

    pub fn config(&self, category: QueueCategory) -> &QueueConfig {
        &self.bindings.get(category).config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::UuidProvider;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::InMemoryGroupedQueue;

    fn binding(slot: QueueCategory, served: QueueCategory, concurrency: usize) -> QueueBinding {
        let queue = InMemoryGroupedQueue::new(
            &QueueConfig::default_for(served),
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
        );
        QueueBinding::new(QueueConfig::new(slot, concurrency), Arc::new(queue))
    }

    #[test]
    fn test_mismatched_queue_rejected() {
        let bindings = PerCategory::from_fn(|c| {
            let served = if c == QueueCategory::Export {
                QueueCategory::Import
            } else {
                c
            };
            binding(c, served, 1)
        });
        assert!(matches!(QueueRegistry::new(bindings), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let bindings = PerCategory::from_fn(|c| binding(c, c, 0));
        assert!(QueueRegistry::new(bindings).is_err());
    }

    #[test]
    fn test_lookup_by_category() {
        let registry = QueueRegistry::new(PerCategory::from_fn(|c| binding(c, c, 4))).unwrap();
        for category in QueueCategory::ALL {
            assert_eq!(registry.queue(category).category(), category);
            assert_eq!(registry.config(category).concurrency, 4);
        }
    }
}
