//! HTTP request handlers.

pub mod flow;

pub use flow::{index, show, update};
