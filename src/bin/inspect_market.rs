use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{Context, Result};
use std::path::Path;

use keeper_rs::chain::ChainReader;
use keeper_rs::config::Config;
use keeper_rs::events::MarketId;
use keeper_rs::keeper::{ChainClock, DetailFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let id: u64 = std::env::args()
        .nth(1)
        .context("usage: inspect_market <market id>")?
        .parse()
        .context("market id must be an unsigned integer")?;

    let cfg = if Path::new("keeper.toml").exists() {
        Config::load(Path::new("keeper.toml"))?
    } else {
        Config::from_env()
    };

    let provider = ProviderBuilder::new().connect(cfg.rpc_url()?).await?.erased();
    let reader = ChainReader::new(provider, cfg.factory_address()?);

    let details = reader.fetch(MarketId::from(id)).await?;
    let now = reader.now().await?;

    println!("Market:    {}", id);
    println!("Contract:  {}", details.contract_address);
    println!("Question:  {}", details.question);
    println!("Deadline:  {}", details.deadline);
    println!("Chain now: {}", now);
    if details.deadline > now {
        println!("Resolvable in {}s of chain time", details.deadline - now);
    } else {
        println!("Deadline passed {}s ago", now - details.deadline);
    }

    Ok(())
}
