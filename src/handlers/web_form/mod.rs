pub mod accept;
pub mod context;
pub mod delete;

// Re-export handler functions for use in routing
pub use accept::post as accept;
pub use context::get as context;
pub use delete::post as delete;
