//! HTTP surface: liveness probe and text generation.

pub mod cors;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod server;

pub use server::{create_router, serve};
