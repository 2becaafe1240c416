pub mod filter;
pub mod principal;
pub mod ranking;
pub mod record;
pub mod vector;
pub mod visibility;
