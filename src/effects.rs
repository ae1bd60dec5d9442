pub mod context;
pub mod filter;
