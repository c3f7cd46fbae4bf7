#![allow(clippy::uninlined_format_args)]

pub mod interact;
pub mod scenario;
