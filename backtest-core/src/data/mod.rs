//! Feed Store: per-TF dense OHLCV + indicator arrays, built once off the hot
//! loop and handed to the engine as a read-only view.

pub mod align;
pub mod builder;
pub mod feed_store;

pub use builder::{DataFrameBuilder, PreflightReport};
pub use feed_store::{FeedStore, MultiTfFeedStore};
