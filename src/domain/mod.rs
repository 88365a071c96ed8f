pub mod defaults;
pub mod filter;
pub mod grid;
pub mod identity;
pub mod metadata;
pub mod query;
pub mod value;
