//! # lingest
//!
//! A bulk import and grouping engine for language-learning content.
//!
//! lingest ingests arbitrarily large JSON payloads of vocabulary words,
//! sentences, or shadowing clips, upserts them idempotently into a content
//! collection, assigns them to named sub-groups, and can re-partition an
//! entire collection into fixed-size chunks without losing per-item state.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │  Request  │──▶│  Importer                 │──▶│  SQLite   │
//! │ CLI/HTTP  │   │ groups → batches → SIZE  │   │ (sqlx)    │
//! └───────────┘   └──────────────────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lingest init                                  # create database
//! lingest import words.json --type WORD --set-id 5
//! lingest repartition --type SENTENCE --set-id 2 --size 20
//! lingest stats
//! lingest serve                                 # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`asset_key`] | Deterministic asset-key derivation |
//! | [`groups`] | Group resolution and insertion cursors |
//! | [`upsert`] | Per-item natural-key upserts |
//! | [`batch`] | Transactional batch processing |
//! | [`partition`] | SIZE-strategy re-partitioning |
//! | [`ingest`] | Import orchestration |
//! | [`server`] | HTTP import API |
//! | [`stats`] | Database statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod asset_key;
pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod groups;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod partition;
pub mod server;
pub mod stats;
pub mod upsert;
