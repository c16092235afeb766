//! Declarative NETMAP/NAT reconciliation for Linux hosts.
//!
//! A YAML configuration document describes, per network link, 1:1 IPv6
//! address mappings (NETMAP), IPv4/IPv6 masquerading, and router
//! advertisement settings. This library compiles that model into a desired
//! rule set, scans the live rule tables into an observed rule set,
//! reconciles the two with a minimal add/remove plan, and applies the plan.
//! The inverse direction is also supported: scanning live state and
//! synthesizing a configuration document that reproduces it.
//!
//! # Architecture
//!
//! - [`config`] — YAML configuration document model
//! - [`link`] — per-link runtime model built once per run
//! - [`compile`] — desired rule sets compiled from the model
//! - [`scan`] — live rule-table, interface, route, and service queries
//! - [`radvd`] — advertisement config file parsing and rendering
//! - [`executor`] — plan application with bounded per-command timeouts
//! - [`synth`] — configuration document synthesis from live state
//! - [`validate`] — structural configuration checks
//! - [`report`] — terminal-friendly colored rendering
//!
//! Rule parsing, canonical keys, and the diff engine live in
//! `rule-diff-core`; everything NAT- and radvd-specific is in this crate.
//!
//! Each invocation rebuilds all state from the configuration document and
//! the live system — nothing persists between runs, so idempotence is
//! re-derived from current state rather than remembered.

pub mod compile;
pub mod config;
pub mod executor;
pub mod link;
pub mod radvd;
pub mod report;
pub mod scan;
pub mod synth;
pub mod validate;
