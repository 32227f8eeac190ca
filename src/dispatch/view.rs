use super::MergedBatch;
use crate::result::PluginResult;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct ViewState {
    generation: u64,
    results: Vec<PluginResult>,
    complete: bool,
}

/// What the presentation layer shows. Batches from a generation older than
/// the newest one already shown are refused, whatever order they arrive in.
#[derive(Debug, Default)]
pub struct ResultView {
    state: Mutex<ViewState>,
}

impl ResultView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `batch` was accepted.
    pub fn publish(&self, batch: &MergedBatch) -> bool {
        let mut state = self.state.lock();
        if batch.generation < state.generation {
            return false;
        }
        state.generation = batch.generation;
        state.results = batch.results.clone();
        state.complete = batch.complete;
        true
    }

    /// Empties the view for `generation`. Batches from older generations are
    /// refused afterwards.
    pub fn clear(&self, generation: u64) {
        let mut state = self.state.lock();
        if generation < state.generation {
            return;
        }
        state.generation = generation;
        state.results.clear();
        state.complete = true;
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().complete
    }

    pub fn snapshot(&self) -> Vec<PluginResult> {
        self.state.lock().results.clone()
    }
}
