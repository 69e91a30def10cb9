// GraphQL over HTTP for the Tibber API (`/v1-beta/gql`).
//
// Carries the home listing, realtime capability lookup, and the one-shot
// live measurement query used when no websocket subscription runs.

pub mod client;
pub mod queries;
pub mod types;

pub use client::GraphQlClient;
pub use types::{HomeFeatures, HomeNode, RealtimeInfo};
