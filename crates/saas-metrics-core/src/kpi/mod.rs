pub mod filter;
pub mod net_new;
pub mod summary;
