pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub mod adapters;
pub mod traits;

pub mod crypto {
    pub mod envelope;
    pub mod kdf;
}

pub mod models {
    pub mod location;
    pub mod session;
    pub mod watched;
}

pub mod repositories {
    pub mod session;
}

pub mod services {
    pub mod coordinator;
    pub mod rate_limiter;
    pub mod throttle;
    pub mod tracking;
}

pub mod handlers {
    pub mod location;
    pub mod respond;
    pub mod sharing;
    pub mod tracking;
    pub mod validation;
}

pub mod validation {
    pub mod sharing;
}
