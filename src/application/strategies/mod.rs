pub mod cash_secured_put;
pub mod common;
pub mod long_option;
pub mod momentum;
pub mod registry;
pub mod traits;

pub use registry::StrategyRegistry;
pub use traits::{CloseConditions, StrategyRunner};
