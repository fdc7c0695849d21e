// Re-export all model types
pub use self::claims::*;
pub use self::document::*;
pub use self::enums::*;
pub use self::errors::*;
pub use self::pagination::*;
pub use self::results::*;

mod claims;
mod document;
mod enums;
mod errors;
mod pagination;
mod results;
