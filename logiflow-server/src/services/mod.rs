//! Multi-step operations, each a single transaction

pub mod delivery;
pub mod route_builder;
pub mod route_lifecycle;
pub mod stop_editor;
