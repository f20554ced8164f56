//! # Arcana Core
//!
//! Shared, WASM-safe logic for Arcana: data models, the card catalog,
//! sentence chunking, the knowledge store abstraction, the retrieval
//! algorithm, and the interpretation prompt/parse/fallback pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or other native-only
//! dependencies. Network-bound collaborators (embedding backends, chat
//! models) are reached through the [`embedding::Embedder`] and
//! [`interpret::ChatModel`] traits, implemented by the `arcana` app crate.

pub mod chunk;
pub mod deck;
pub mod embedding;
pub mod interpret;
pub mod models;
pub mod retrieve;
pub mod spread;
pub mod store;
