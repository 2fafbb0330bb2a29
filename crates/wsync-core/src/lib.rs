//! wsync Core - configuration, domain types and ports
//!
//! This crate contains the parts of wsync that every other crate shares:
//! - **Configuration** - YAML-backed [`config::Config`] with validation and a builder
//! - **Domain types** - validated [`domain::RemotePath`] and [`domain::WorkspaceHost`]
//! - **Port definitions** - the [`ports::IWorkspaceFiles`] trait implemented by
//!   remote adapters and consumed by the sync engine
//!
//! # Architecture
//!
//! Ports define trait interfaces that adapter crates implement. The sync
//! core depends only on these traits, never on a concrete transport.

pub mod config;
pub mod domain;
pub mod ports;
