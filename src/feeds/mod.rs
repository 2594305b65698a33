pub mod factory;

pub use factory::{decode_market_created, FactoryFeed, FeedItem};
