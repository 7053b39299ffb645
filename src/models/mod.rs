pub mod common;
pub mod sales;
pub mod telegram;
