//! # Signal Harvest Core
//!
//! Runtime-free logic for Signal Harvest: data models, the store
//! abstraction, the extraction and discovery prompts, and the decoder
//! that turns free-text model replies into typed results.
//!
//! This crate contains no tokio, sqlx, reqwest, or other native I/O
//! dependencies. Everything that talks to the network or a database
//! lives in the `signal-harvest` package.

pub mod decode;
pub mod models;
pub mod prompt;
pub mod store;
