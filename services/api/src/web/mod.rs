pub mod assignments;
pub mod auth;
pub mod middleware;
pub mod pages;
pub mod rest;
pub mod router;
pub mod settings;
pub mod state;
pub mod theme;

pub use middleware::require_auth;
pub use router::build_router;
