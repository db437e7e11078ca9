use std::fmt;

/// Lifecycle of a single download worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Init,
    Classified,
    ShortCircuitDone,
    Verifying,
    AlreadyComplete,
    Fetching,
    Reassembling,
    PostProcessing,
    Completed,
    Abandoned,
    IntegrityExhausted,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerState::Completed | WorkerState::Abandoned | WorkerState::IntegrityExhausted
        )
    }

    pub fn can_advance_to(self, next: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, next),
            (Init, Classified)
                | (Classified, ShortCircuitDone | Verifying)
                | (ShortCircuitDone, Completed)
                | (Verifying, AlreadyComplete | Fetching)
                | (AlreadyComplete, Completed)
                | (Fetching, Reassembling | Abandoned | IntegrityExhausted)
                // A reassembled file that fails verification is fetched again.
                | (Reassembling, PostProcessing | Fetching | IntegrityExhausted)
                | (PostProcessing, Completed)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current state of a worker, logging every transition.
#[derive(Debug)]
pub(crate) struct StateTracker {
    current: WorkerState,
    item: String,
}

impl StateTracker {
    pub(crate) fn new(item: impl Into<String>) -> Self {
        Self {
            current: WorkerState::Init,
            item: item.into(),
        }
    }

    pub(crate) fn current(&self) -> WorkerState {
        self.current
    }

    pub(crate) fn advance(&mut self, next: WorkerState) {
        debug_assert!(
            self.current.can_advance_to(next),
            "invalid worker transition {} -> {}",
            self.current,
            next
        );
        tracing::trace!(item = %self.item, from = %self.current, to = %next, "Worker state");
        self.current = next;
    }
}
