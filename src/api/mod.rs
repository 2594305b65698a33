pub mod llm;

pub use llm::LlmOracle;
