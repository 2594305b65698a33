//! Minimal bindings for the factory and per-market contracts.
//!
//! Only the calls and the one event the keeper touches are declared.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IMarketFactory {
        /// Only `marketId` is indexed; the rest sits in the data section.
        event MarketCreated(
            uint256 indexed marketId,
            string question,
            string details,
            uint256 deadline,
            uint256 createdAt,
            address creator
        );

        /// Positional outputs: 3 is the question, 5 the deadline.
        function getDeployedMarket(uint256 _marketId)
            external
            view
            returns (
                address,
                uint256,
                uint256,
                string memory,
                string memory,
                uint256,
                uint256,
                address,
                bool,
                uint256,
                uint8,
                address,
                address
            );

        function markets(uint256) external view returns (address);
    }

    #[sol(rpc)]
    interface IMarket {
        function resolve(uint8 _finalResolution) external;
        function distribute() external;
    }
}
