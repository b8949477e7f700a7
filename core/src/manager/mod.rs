mod engine;
mod retry;
mod scheduler;
mod types;

pub use engine::{ImageGenerationManager, ImageGenerationManagerBuilder};
pub use retry::{strategy_for, ExponentialBackoff, FixedDelay, RetryStrategy};
pub use types::{DrainSummary, TaskOutcome};
