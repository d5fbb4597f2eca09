//! # Brick Harness
//!
//! A local-first tracker for a collection of building-block sets and loose
//! parts. It decides, whenever parts become available, which sets should
//! receive them.
//!
//! Brick Harness ingests a set's inventory from a parts catalog (resolving
//! ambiguous element variants with the user's help), then distributes each
//! newly available quantity across the sets that need it in a manually
//! ranked priority order, keeping completion percentages and a dense
//! priority sequence consistent.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌────────────┐
//! │   Catalog   │──▶│  Ingestion  │──▶│            │
//! │ (snapshot)  │   │ + Resolver  │   │   SQLite   │
//! └─────────────┘   └─────────────┘   │ sets/parts │
//!                   ┌─────────────┐   │ set_parts  │
//!   new parts ─────▶│ Allocation  │──▶│            │
//!                   └──────┬──────┘   └────────────┘
//!                          ▼
//!             Completion + Priority normalizer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! brick init
//! brick add-set 10696-1
//! brick allocate --part 3001 --color 4 --quantity 12
//! brick sets
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`catalog`] | Parts catalog abstraction and JSON snapshot |
//! | [`resolver`] | Element variant resolution |
//! | [`ingest`] | Resumable set ingestion |
//! | [`allocate`] | Allocation engine |
//! | [`priority`] | Dense priority normalization |
//! | [`completion`] | Set completion tracking |
//! | [`queries`] | Read-only listings |
//! | [`stats`] | Collection summary |

pub mod allocate;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod priority;
pub mod queries;
pub mod resolver;
pub mod stats;

#[cfg(test)]
mod test_support;
