//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service` with its desktop bridges). Host
//! applications can depend on `anime-tracker-workspace` and enable the
//! documented features without wiring each crate individually.
