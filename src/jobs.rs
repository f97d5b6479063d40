use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generation a unit of background work was started under.
pub type Generation = u64;

/// Shared monotonic counter implementing cancellation by invalidation: a task
/// captures the generation it was spawned under and its result is dropped
/// unless that generation is still current when the result comes back.
/// Nothing interrupts the task itself; superseded work runs to completion and
/// is discarded.
#[derive(Clone, Debug, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates all work started under earlier generations and returns the
    /// new current generation.
    pub fn bump(&self) -> Generation {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> Generation {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_invalidates_prior_generation() {
        let counter = GenerationCounter::new();
        let first = counter.bump();
        assert!(counter.is_current(first));

        let second = counter.bump();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_clones_share_the_counter() {
        let counter = GenerationCounter::new();
        let held_by_task = counter.clone();
        let generation = held_by_task.current();

        counter.bump();
        assert!(!held_by_task.is_current(generation));
    }
}
