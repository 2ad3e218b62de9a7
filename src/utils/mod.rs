//! Shared helpers for the waymark engine.

pub mod json_ext;
