pub mod api;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod middleware;

pub use api::*;
pub use auth::*;
pub use health::*;
pub use metrics::*;
pub use middleware::*;
