//! REST API client module for Wekan servers.
//!
//! This module provides the `ApiClient` for making authenticated requests
//! and the `HttpLoginTransport` that performs the login calls behind it.
//!
//! The API uses bearer token authentication obtained from the
//! `/users/login` endpoint.

pub mod client;
pub mod error;
pub mod login;

pub use client::ApiClient;
pub use error::ApiError;
pub use login::HttpLoginTransport;
