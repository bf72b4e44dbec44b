//! autobuild-lib: Core pipeline for autobuild
//!
//! This crate turns a build recipe into verified, hashed binary tarballs for a
//! set of target platforms:
//! - `source`: resolve and verify declared sources
//! - `autobuild`: run the per-platform build loop
//! - `dependency`: stage upstream artifacts and remove them after the build
//! - `package`: deterministic tarballs and their hashes
//! - `release`: rebuild the product hash map from a published release
//! - `manifest`: the product hash map and its `build.lua` rendering

pub mod autobuild;
pub mod config;
pub mod consts;
pub mod dependency;
pub mod error;
pub mod heartbeat;
pub mod manifest;
pub mod package;
pub mod platform;
pub mod product;
pub mod recipe;
pub mod release;
pub mod sandbox;
pub mod source;
pub mod util;
pub mod workspace;
