//! piccat - a personal catalog of image directories.
//!
//! Each catalog record points at one directory of images. Per-record file
//! statistics are cached in a separate table and joined into a combined
//! view; [`consistency`] detects when that cache has drifted and
//! [`stats`] rebuilds it.

pub mod config;
pub mod consistency;
pub mod db;
pub mod error;
pub mod export;
pub mod library;
pub mod logging;
pub mod navigator;
pub mod purge;
pub mod stats;

pub use error::{Error, Result};
pub use library::Library;
