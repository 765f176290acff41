pub mod config;
pub mod error;
pub mod inspect;
pub mod observability;
pub mod proxy;
