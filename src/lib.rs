// src/lib.rs
pub mod adjust;
pub mod cache;
pub mod config;
pub mod discover;
pub mod fetch;
pub mod read;
pub mod render;
pub mod sheet;
