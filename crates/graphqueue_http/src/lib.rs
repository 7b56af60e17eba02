//! Thin HTTP adapter over the GraphQueue core. Owns zero business logic:
//! every handler calls into `graphqueue_store`/`graphqueue_workflows`/
//! `graphqueue_upstream` and maps the `Result` onto a status code.

pub mod dto;
pub mod error;
pub mod inputpath;
pub mod routes;
pub mod state;
pub mod submit;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
