//! EVR asset package format
//!
//! Game assets are addressed by a `(type symbol, file symbol)` pair and
//! stored in independently zstd-compressed frames spread over a set of
//! package files (`packages/<name>_0`, `packages/<name>_1`, ...). A manifest
//! (`manifests/<name>`) records where every file lives.
//!
//! This crate provides:
//!
//! - [`manifest`]: the binary manifest codec and its on-disk container
//! - [`Package`]: frame-addressed reads and extraction
//! - [`Builder`]: packing a fresh package set from grouped files
//! - [`repack()`] and [`quick_repack`]: rewriting only the frames touched by
//!   modified files, as a new package set or in place

pub mod builder;
pub mod config;
pub mod container;
pub mod error;
pub mod manifest;
pub mod package;
mod pipeline;
pub mod pool;
pub mod repack;
pub mod scanner;
pub mod source;
pub mod writer;

pub use builder::Builder;
pub use config::PackageConfig;
pub use error::{PackageError, Result};
pub use manifest::{Manifest, SymbolKey};
pub use package::{ExtractOptions, ExtractStats, Package};
pub use repack::{QuickRepackReport, quick_repack, repack};
pub use scanner::scan_files;
pub use source::{FileSource, InputFile};
