//! Rendering core and the resolvers that feed it.

pub mod encode;
pub mod error;
pub mod origin;
pub mod render;
pub mod target;
