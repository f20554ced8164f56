//! # Arcana
//!
//! Server side of a guided tarot self-reflection app: a knowledge base with
//! retrieval, AI interpretations with a deterministic fallback, saved
//! readings with journaling, and a credit ledger topped up by a payment
//! webhook.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Ingestion  │──▶│ Chunk+Embed │──▶│  SQLite  │
//! │ HTTP / CLI  │   │ (JoinSet)   │   │ KB+Ledger│
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │ Retrieve │──────▶│ Interpret│──▶ chat model
//!                 └──────────┘       └──────────┘    or template
//! ```
//!
//! Pure logic (chunking, retrieval, prompts, fallback text) lives in the
//! `arcana-core` crate; this crate adds storage, providers, auth and the
//! HTTP/CLI surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! arcana init                                   # create database
//! arcana kb ingest ./docs/major-arcana.md       # add knowledge
//! arcana admin add <user-id>                    # grant admin
//! arcana token <user-id>                        # dev bearer token
//! arcana serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and secret resolution |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite knowledge store |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat-completions client |
//! | [`ingest`] | Ingestion pipeline |
//! | [`interpret`] | Interpretation entry point with knowledge grounding |
//! | [`auth`] | Bearer tokens and admin membership |
//! | [`credits`] | Credit ledger |
//! | [`readings`] | Saved readings and journals |
//! | [`cards`] | Seeded tarot card catalog |
//! | [`preferences`] | Per-user reading preferences |
//! | [`payments`] | Payment webhook |
//! | [`stats`] | Admin statistics |
//! | [`server`] | HTTP API |
//! | [`error`] | HTTP error type |
//! | [`kb`], [`admin`] | CLI commands |

pub mod admin;
pub mod auth;
pub mod cards;
pub mod config;
pub mod credits;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod interpret;
pub mod kb;
pub mod llm;
pub mod migrate;
pub mod payments;
pub mod preferences;
pub mod readings;
pub mod server;
pub mod sqlite_store;
pub mod stats;
