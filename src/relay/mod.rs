//! Local HTTP relay speaking the hosted store's REST + event-stream contract,
//! backed by an in-process [`MemoryFeedStore`](crate::feed::MemoryFeedStore).

mod handlers;
mod server;

pub use server::{router, RelayServer, RelayState};
