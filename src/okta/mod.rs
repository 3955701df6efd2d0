//! Okta management API: user creation, rate limit handling, and schema lookup.

pub mod client;
pub mod rate_limit;
pub mod schema;

pub use client::{CreateUserResponse, OktaClient, UserApi};
pub use rate_limit::RateLimit;
pub use schema::{AttributeType, RemoteSchema, preflight};
