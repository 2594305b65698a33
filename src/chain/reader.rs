use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::BlockNumberOrTag;
use async_trait::async_trait;
use tracing::debug;

use crate::chain::contracts::IMarketFactory;
use crate::error::{ClockError, DetailFetchError};
use crate::events::MarketId;
use crate::keeper::{ChainClock, DetailFetcher};
use crate::state::MarketDetails;

/// Read-only view of the factory: market details and chain time.
#[derive(Clone)]
pub struct ChainReader {
    provider: DynProvider,
    factory: Address,
}

impl ChainReader {
    pub fn new(provider: DynProvider, factory: Address) -> Self {
        Self { provider, factory }
    }
}

#[async_trait]
impl DetailFetcher for ChainReader {
    async fn fetch(&self, id: MarketId) -> Result<MarketDetails, DetailFetchError> {
        let factory = IMarketFactory::new(self.factory, self.provider.clone());

        let deployed = factory
            .getDeployedMarket(id.as_u256())
            .call()
            .await
            .map_err(|e| DetailFetchError::Call(Box::new(e)))?;
        let contract_address = factory
            .markets(id.as_u256())
            .call()
            .await
            .map_err(|e| DetailFetchError::Call(Box::new(e)))?;

        debug!(market = %id, contract = %contract_address, "fetched market details");
        details_from_parts(contract_address, deployed._3, deployed._5)
    }
}

#[async_trait]
impl ChainClock for ChainReader {
    async fn now(&self) -> Result<u64, ClockError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ClockError::Rpc(Box::new(e)))?
            .ok_or(ClockError::MissingBlock)?;
        Ok(block.header.timestamp)
    }
}

/// Validate raw call outputs into `MarketDetails`.
pub(crate) fn details_from_parts(
    contract_address: Address,
    question: String,
    deadline: U256,
) -> Result<MarketDetails, DetailFetchError> {
    if contract_address == Address::ZERO {
        return Err(DetailFetchError::Inconsistent(
            "market contract address is zero".to_string(),
        ));
    }
    if question.trim().is_empty() {
        return Err(DetailFetchError::Inconsistent("question is empty".to_string()));
    }
    let deadline = u64::try_from(deadline)
        .map_err(|_| DetailFetchError::Inconsistent(format!("deadline {deadline} does not fit in u64")))?;

    Ok(MarketDetails {
        contract_address,
        question,
        deadline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_from_valid_parts() {
        let address = Address::repeat_byte(0xab);
        let details =
            details_from_parts(address, "Will X happen?".to_string(), U256::from(1010)).unwrap();

        assert_eq!(details.contract_address, address);
        assert_eq!(details.question, "Will X happen?");
        assert_eq!(details.deadline, 1010);
    }

    #[test]
    fn test_rejects_inconsistent_details() {
        let address = Address::repeat_byte(0xab);

        let zero = details_from_parts(Address::ZERO, "q".to_string(), U256::from(1));
        assert!(matches!(zero, Err(DetailFetchError::Inconsistent(_))));

        let blank = details_from_parts(address, "   ".to_string(), U256::from(1));
        assert!(matches!(blank, Err(DetailFetchError::Inconsistent(_))));

        let huge = details_from_parts(address, "q".to_string(), U256::MAX);
        assert!(matches!(huge, Err(DetailFetchError::Inconsistent(_))));
    }
}
