// src/lib.rs

//! chapter-notifier library
//!
//! Polls a release listing, filters it against a watch list and posts every
//! new chapter to Discord exactly once.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
