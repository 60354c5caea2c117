//! Karachi Coffee Culture dashboard HTTP client
//!
//! Provides the session-aware request coordinator that every dashboard API
//! call goes through, plus typed wrappers for the cafe admin endpoints.

pub mod client;
pub mod types;

pub use client::{
    ClientConfig, DashboardClient, DashboardClientBuilder,
    error::{ClientError, RefreshFailure},
    request::ApiRequest,
    session::{SessionCoordinator, SessionListener},
    store::{FileCookieStore, MemoryCookieStore, RefreshCookie, RefreshTokenStore},
};
