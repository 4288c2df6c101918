pub mod market;
pub mod transaction;
