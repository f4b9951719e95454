//! Render the items of RSS/Atom feeds into one Markdown file each.
//!
//! A run resolves the configured feed URLs, fetches and parses each feed, and
//! for every item normalizes its fields, derives a file name slug, fills the
//! template's placeholders and writes `{output_dir}/{slug}.md`.
//!
//! - [`config`] - TOML file + CLI overrides, validated into a [`config::RunConfig`]
//! - [`feed`] - Source resolution, HTTP fetching, feed parsing
//! - [`item`] - Per-item normalization
//! - [`slug`] - File base names and per-run collision handling
//! - [`template`] - `[TITLE]`-style placeholder substitution
//! - [`output`] - Atomic file writes
//! - [`pipeline`] - The run itself and its [`pipeline::RunReport`]

pub mod config;
pub mod feed;
pub mod item;
pub mod output;
pub mod pipeline;
pub mod slug;
pub mod template;
pub mod util;
