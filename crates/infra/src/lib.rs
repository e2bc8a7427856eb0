//! Infrastructure layer: event storage, command dispatch, read models, config.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod read_model;
