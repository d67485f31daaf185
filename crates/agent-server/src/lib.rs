pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod server;
pub mod state;

pub use config::{Settings, TodoBackend};
pub use error::{ApiError, StartupError};
pub use server::{build_cors, configure, run_server};
pub use state::AppState;
