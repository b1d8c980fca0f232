//! Integration tests for package loading against scratch workspaces.

mod cache_tests;
mod common;
mod label_validity_tests;
mod transitive_tests;
