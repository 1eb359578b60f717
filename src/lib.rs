//! # Alert Codifier
//!
//! Resolves Ukrainian air-raid alerts to codes of the national codifier of
//! administrative-territorial units (КАТОТТГ).
//!
//! The codifier dataset is loaded once into an immutable in-memory index.
//! The active alert list is pulled from an upstream feed and cached for 20
//! seconds. Each alert names its location loosely (`"м. Ізмаїл"`,
//! `"Ізмаїльський район"`); the resolver normalizes those names and looks
//! them up in the index.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Alert feed │──▶│ AlertCache │──▶│   Resolver   │──▶│ CodifierIndex │
//! │ (HTTP/file)│   │  TTL 20 s  │   │ + normalizer │   │  (JSON, RAM)  │
//! └────────────┘   └─────┬──────┘   └──────────────┘   └───────────────┘
//!                        │
//!                ┌───────┴────────┐
//!                ▼                ▼
//!          ┌──────────┐     ┌──────────┐
//!          │   CLI    │     │   HTTP   │
//!          │(codifier)│     │  (axum)  │
//!          └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! codifier search "Татарбунари"
//! codifier code UA51080000000061776
//! codifier lookup --region "Одеська область" --district "Ізмаїльський район"
//! codifier browse --region Одеська
//! codifier alerts --location-type city
//! codifier serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Categories, levels, records, alerts |
//! | [`codifier`] | Dataset loading and indexed lookups |
//! | [`normalize`] | Stripping administrative decorations from names |
//! | [`resolver`] | Alert → code resolution strategies |
//! | [`feed`] | Upstream alert feed clients |
//! | [`cache`] | TTL cache with single-flight refresh |
//! | [`alerts`] | Filtering and enrichment views |
//! | [`config`] | TOML configuration parsing |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod alerts;
pub mod cache;
pub mod codifier;
pub mod commands;
pub mod config;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod server;
