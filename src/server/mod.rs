// Web服务器模块

pub mod error;
pub mod handlers;
mod router;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
