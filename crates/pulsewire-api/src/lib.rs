// pulsewire-api: Async Rust client for the Tibber data, GraphQL, and realtime APIs

pub mod client;
pub mod data;
pub mod error;
pub mod graphql;
pub mod subscription;
pub mod transport;

pub use client::{ApiEndpoints, TelemetryClient};
pub use data::DataApiClient;
pub use data::types::{CapabilityResponse, DeviceResponse, HomeResponse};
pub use error::{Error, ErrorKind};
pub use graphql::{GraphQlClient, HomeNode, RealtimeInfo};
pub use subscription::{ServerMessage, SubscriptionConnection};
pub use transport::TransportConfig;

/// Tibber Data API base.
pub const DEFAULT_DATA_API_URL: &str = "https://data-api.tibber.com/v1";

/// GraphQL HTTP endpoint.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.tibber.com/v1-beta/gql";

/// Realtime subscription endpoint used when the service advertises none.
pub const DEFAULT_SUBSCRIPTION_URL: &str =
    "wss://websocket-api.tibber.com/v1-beta/gql/subscriptions";
