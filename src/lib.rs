// Identity service library: account registration with email verification,
// credential login issuing a signed session token, and the middleware that
// authorizes protected requests with it.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
