//! Frame layout, components and the event loop.

pub mod components;
pub mod main_component;
pub mod runtime;
