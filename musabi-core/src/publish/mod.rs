//! Social publishing through the content publishing Graph API.
//!
//! # Configuration
//!
//! Resolved from the secret store:
//!
//! - `/meta/musabi/access-token`
//! - `/meta/musabi/account-id`
//! - `/meta/musabi/version` (e.g. "v21.0")
//! - `/meta/musabi/graph-url` (e.g. "https://graph.facebook.com")

mod client;
mod config;
mod fake;
mod publisher;

pub use client::{
    parse_graph_body, parse_publishing_limit, ContainerStatus, GraphApi, GraphClient, MediaInfo,
    PublishingLimit,
};
pub use config::MetaConfig;
pub use fake::{FakeGraphApi, GraphCall};
pub use publisher::{PublishRequest, PublishedMedia, SocialPublisher};
