#![doc = "figma-kit-core: core logic library for figma-kit."]

//! Data model, token resolution, node enrichment, design token extraction and tree
//! splitting for Figma design data, plus the REST client and the sync pipeline that feed
//! them.
//!
//! # Usage
//! Add this as a dependency for anything that needs to fetch, enrich, scan or split
//! Figma node trees. The `figma-kit` crate is the command-line front end.

pub mod client;
pub mod color;
pub mod config;
pub mod contract;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod model;
pub mod split;
pub mod synchronise;
pub mod tokens;

pub use error::{FigmaError, Result};
