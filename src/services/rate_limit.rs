use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use nonzero_ext::nonzero;

type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// In-memory per-client-IP rate limiting for the credential endpoints.
/// State is process-local; limits reset on restart.
pub struct RateLimits {
    login: IpLimiter,
    register: IpLimiter,
}

impl RateLimits {
    pub fn new() -> Self {
        Self {
            login: RateLimiter::keyed(Quota::per_minute(nonzero!(5u32))),
            register: RateLimiter::keyed(Quota::per_minute(nonzero!(3u32))),
        }
    }

    pub fn check_login(&self, client_ip: &str) -> bool {
        self.login.check_key(&client_ip.to_string()).is_ok()
    }

    pub fn check_register(&self, client_ip: &str) -> bool {
        self.register.check_key(&client_ip.to_string()).is_ok()
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new()
    }
}
