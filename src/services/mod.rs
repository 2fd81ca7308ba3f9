pub mod accounts;
pub mod mailer;
pub mod middleware;
pub mod rate_limit;
pub mod store;
pub mod tokens;

pub use accounts::AccountService;
pub use mailer::{Mailer, SmtpMailer};
pub use middleware::{extract_claims, SessionAuth, SESSION_COOKIE};
pub use rate_limit::RateLimits;
pub use store::{NewUser, PgUserStore, StoreError, UserStore};
pub use tokens::SessionSigner;
