pub mod anthropic;

pub use anthropic::AnthropicOracle;
