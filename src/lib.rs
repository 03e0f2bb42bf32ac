//! curate — fetches recent tech articles (Qiita, Zenn), deduplicates them
//! against a SQLite store, classifies each into a configured taxonomy,
//! summarizes via the Anthropic API, and appends rendered markdown documents
//! into a category-partitioned archive with per-bucket statistics.

pub mod classify;
pub mod config;
pub mod path_builder;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod storage;
pub mod summarize;
pub mod taxonomy;
