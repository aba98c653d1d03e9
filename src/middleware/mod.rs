pub mod cors;

// Re-export middleware functions
pub use cors::{cors_headers, cors_middleware};
