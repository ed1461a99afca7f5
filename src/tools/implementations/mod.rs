//! Adapter implementations

pub mod rest;

pub use rest::{ResponseFormat, RestAdapter};
