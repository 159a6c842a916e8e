pub mod backend;
pub mod commands;
pub mod configuration;
pub mod configuration_handler;
pub mod conflict_checker;
pub mod contact;
#[cfg(feature = "postgres")]
pub mod database_interface;
pub mod error;
pub mod http;
pub mod local_store;
pub mod pipeline;
#[cfg(feature = "postgres")]
pub mod schema;
#[cfg(test)]
mod testutils;
pub mod text_generation;
pub mod time_window;
pub mod types;
