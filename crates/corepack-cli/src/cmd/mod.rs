//! Subcommand handlers.

pub mod clean;
pub mod disable;
pub mod dispatch;
pub mod enable;
pub mod hydrate;
pub mod prepare;
