// REST client for the Tibber Data API.
//
// Base path: /v1/
// Auth: Bearer token on every request

pub mod client;
pub mod types;

pub use client::DataApiClient;
