// src/core/mod.rs

pub mod arg_parser;
pub mod commons;
pub mod config_loader;
pub mod discovery;
pub mod help;
pub mod option_schema;
pub mod pipeline;
pub mod registry;
pub mod router;
