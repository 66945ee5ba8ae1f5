//! # Signal Harvest
//!
//! Turns forum posts into structured market insights.
//!
//! Signal Harvest sweeps a list of Reddit channels (or channels discovered
//! for a user's query), stores the top text posts, and asks a language
//! model to extract a structured insight from each one. Old posts and
//! insights are purged after a fixed retention horizon.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐   ┌────────────┐
//! │   Reddit    │──▶│  Ingestion   │──▶│  SQLite   │──▶│  Insights  │
//! │  (source)   │   │ probe+dedup  │   │  posts    │   │ completion │
//! └─────────────┘   └──────────────┘   └────┬─────┘   └────────────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │(harvest) │       │  server  │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest init                          # create database
//! harvest channels                      # probe configured channels
//! harvest run                           # sweep, ingest, extract
//! harvest ingest --channel ADHD --query "focus apps" --user u1
//! harvest serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`source`] | Content source trait |
//! | [`reddit`] | Reddit content source |
//! | [`completion`] | Completion service trait and OpenAI client |
//! | [`ingest`] | Ingestion pipeline |
//! | [`extract`] | Single-post insight extraction |
//! | [`insights`] | Insight pipeline |
//! | [`retention`] | Retention sweep |
//! | [`discover`] | Channel discovery |
//! | [`harvest`] | Orchestration |
//! | [`server`] | HTTP server |
//! | [`sqlite_store`] | SQLite store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod channels;
pub mod commands;
pub mod completion;
pub mod config;
pub mod db;
pub mod dedup;
pub mod discover;
pub mod error;
pub mod extract;
pub mod harvest;
pub mod ingest;
pub mod insights;
pub mod migrate;
pub mod reddit;
pub mod retention;
pub mod server;
pub mod source;
pub mod sqlite_store;
pub mod stats;

pub use signal_harvest_core::models;
pub use signal_harvest_core::store;
