pub const REFERENCE: &'static str = include_str!("../reference.toml");

pub mod config;
pub mod discoverer;
pub mod error;
pub mod ext;
pub mod identity;
pub mod inventory;
pub mod listener;
pub mod member;
pub mod util;
