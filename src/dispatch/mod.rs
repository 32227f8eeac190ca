//! Query generations: routing, concurrent fan-out and the streaming merge
pub mod cancel;
pub mod engine;
pub mod merge;
pub mod view;

pub use cancel::CancellationToken;
pub use engine::{DispatchEngine, DispatchOutcome, DispatchSettings, MergedBatch};
pub use merge::ResultMerger;
pub use view::ResultView;
