mod client;
mod response;

pub use client::{BearerToken, ExternalSearchClient, SearchQuery};
pub use response::parse_statuses;
