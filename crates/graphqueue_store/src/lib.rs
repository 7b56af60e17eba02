//! Durable SQLite-backed store for GraphQueue jobs and prompts.

pub mod error;
pub mod models;
pub mod pool;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use models::{
    CancelMode, CancelSummary, InputDirHistoryRow, Job, NewPrompt, Prompt, PromptPresetRow,
    QueueCounts, SettingsPresetRow, Status,
};
pub use pool::{create_pool, DbConfig};
pub use store::{PromptStatusUpdate, QueueStore};
