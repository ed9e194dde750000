//! Browser discovery and the Chromium engine.

pub mod binary;
pub mod chromium;

pub use binary::{BinaryResolver, DiskProbe, FileProbe, HostContext, HostEnvironment};
pub use chromium::ChromiumEngine;
