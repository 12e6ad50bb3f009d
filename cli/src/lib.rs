pub mod commands;
pub mod error;
pub mod pipeline;
#[macro_use]
extern crate log;
