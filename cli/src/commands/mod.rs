pub mod check;
pub mod filter;
