//! End-to-end tests driving the pipeline through real local workspaces.

#![cfg(unix)]

mod common;
mod pipeline_tests;
mod reconstruct_tests;
