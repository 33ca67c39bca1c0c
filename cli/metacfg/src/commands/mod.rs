//! CLI command implementations.

pub mod check;
pub mod configure;
pub mod inspect;
