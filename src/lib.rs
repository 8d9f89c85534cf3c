//! # docvault
//!
//! A document ingestion and vector retrieval service. Uploaded documents
//! are split into overlapping chunks, embedded via an external provider,
//! and persisted so that a free-text query can retrieve the most
//! semantically relevant fragments, scoped by project and/or document.
//!
//! ## Architecture
//!
//! ```text
//! upload ──▶ extract ──▶ split ──▶ embed ──▶ VectorStore  (write path)
//!                                               │
//! query ───▶ embed ───────────────▶ similarity ─┘          (read path)
//!
//! project/document listings and delete operate on stored metadata.
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Chunk, metadata, and result types |
//! | [`extract`] | Per-file-type text extraction (pdf, docx, pptx, xlsx, text) |
//! | [`split`] | Overlapping character-window splitter |
//! | [`embedding`] | Embedding providers (OpenAI, Azure, offline hash) |
//! | [`store`] | VectorStore trait with SQLite and in-memory backends |
//! | [`index`] | Project and document listings derived from metadata |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`retrieve`] | Query embedding and top-k retrieval |
//! | [`db`] | SQLite connection setup |
//! | [`migrate`] | Schema creation |
//!
//! ## Consistency model
//!
//! Each ingestion commits as one atomic append after every chunk of the
//! document has been embedded; a provider or store failure leaves no
//! partial document behind. Concurrent ingestions of different documents
//! are independent. Ingest and delete of the *same* document are not
//! coordinated by a lock — last writer wins, eventually visible — and
//! reads are not snapshot-isolated. Deployments needing stronger
//! guarantees should wrap ingest+delete in a per-file-name lease.

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod split;
pub mod store;
