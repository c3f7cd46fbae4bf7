#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod error;
pub mod resource;
