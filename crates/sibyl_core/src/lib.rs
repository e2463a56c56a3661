pub mod alias;
pub mod classify;
pub mod config;
pub mod table;

pub use alias::AliasStore;
pub use classify::{suggest_fixes, Classification, FixContext};
pub use config::SibylConfig;
pub use table::format_as_table;
