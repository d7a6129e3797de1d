//! Request handlers.

pub mod health;
pub mod jobs;
pub mod library;
pub mod media;
pub mod pipeline;
pub mod storage;
pub mod story;
pub mod vision;

pub use health::*;
pub use jobs::*;
pub use library::*;
pub use media::*;
pub use pipeline::*;
pub use storage::*;
pub use story::*;
pub use vision::*;

use serde::Deserialize;

/// `?user_id=` on user-scoped routes.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}
