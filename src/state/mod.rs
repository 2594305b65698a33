mod market;
mod registry;

pub use market::{MarketDetails, MarketRecord, Phase};
pub use registry::MarketRegistry;
