pub mod auth;

pub use auth::configure_routes;
