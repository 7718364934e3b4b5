//! # Variant Forge
//!
//! Produces responsive WebP image variants for pages described by document
//! tables, and rewrites the pages' markup to reference the right variant at
//! every `<source>`/`<img>` tag.
//!
//! # Architecture: Per-Document Pipeline
//!
//! Each source document runs through the same three stages, independently
//! of every other document:
//!
//! ```text
//! 1. Scan      documents/doc1.json  →  ImageRecord list   (table cells → identifiers)
//! 2. Rewrite   html/doc1.html       →  html/doc1.html     (references → {id}{width}.webp)
//! 3. Variants  images/{id}.jpg      →  output/doc1/       (one WebP per required size)
//! ```
//!
//! Each record's row label yields a **code** (e.g. `COMFRPTC09`). The code
//! picks the required output sizes and the rewriting strategy:
//!
//! - **Breakpoint**: each tag's width comes from its own `media` query,
//!   looked up in the code's breakpoint table, with a carousel heuristic
//!   deciding between two candidates at high resolution.
//! - **Ordinal**: a fixed width list is handed out to successive plain
//!   references in document order.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Document discovery and table scanning into [`types::ImageRecord`]s |
//! | [`code`] | Code extraction from row labels |
//! | [`rules`] | Size, breakpoint, and no-condition table shapes |
//! | [`breakpoint`] | Media query parsing and width resolution with reasons |
//! | [`carousel`] | Carousel context heuristic over preceding markup lines |
//! | [`rewrite`] | Markup rewriting: breakpoint and ordinal strategies |
//! | [`imaging`] | Canvas-fit resize and WebP encoding behind a backend trait |
//! | [`process`] | Batch driver: parallel per-document pipeline, aggregate logs |
//! | [`report`] | Reporter trait and the missing image log |
//! | [`config`] | `config.toml` loading, stock defaults, merging, and validation |
//! | [`types`] | Shared types passed between stages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Immutable Configuration
//!
//! Configuration is loaded once into an [`config::AppConfig`] and passed by
//! reference into every component. Nothing mutates it during a run; a new
//! run loads a new value.
//!
//! ## Idempotent Variants, Single-Shot Rewrites
//!
//! A variant that already exists on disk is never re-encoded, so re-running
//! a batch only fills gaps. Markup rewriting is not idempotent (rewritten
//! names no longer look like source references), so each markup file is
//! rewritten at most once per run.
//!
//! ## Explicit Reporting
//!
//! Components never log through a global sink. They receive a
//! [`report::Reporter`], which lets tests capture warnings and missing-image
//! reports and lets the binary route them to `tracing` and the missing image
//! log.

pub mod breakpoint;
pub mod carousel;
pub mod code;
pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod report;
pub mod rewrite;
pub mod rules;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
