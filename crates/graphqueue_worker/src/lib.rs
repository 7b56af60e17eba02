//! Single long-running worker task that dispatches pending prompts.

pub mod cancel;
pub mod mover;
pub mod worker;

pub use cancel::StopToken;
pub use worker::{Worker, WorkerConfig};
