//! Page-to-PDF rendering through a headless Chromium, served three ways:
//! a function-host handler, a batch generator and a standalone server.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
