mod batch;
mod memory;
mod push_id;
mod rest;
pub mod sse;
mod store;
mod sync;


pub use batch::{KeyedPost, PostBatch};
pub use memory::MemoryFeedStore;
pub use push_id::{PushId, PushIdGenerator};
pub use rest::RestFeedStore;
pub use store::{FeedStore, StoreEvent, StoreEventStream};
pub use sync::{FeedSubscription, FeedUpdate, RemoteFeedSync};
