// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coral Core
//!
//! Coordination server for groups of cooperating agents. A session holds a
//! set of registered agents, their threads and messages, and the blocking
//! groups derived from an agent graph. Agents talk to a session through a
//! small set of tools exposed over HTTP.
//!
//! # Architecture
//!
//! - [`domain`]: sessions, threads, agent graphs, registry and configuration
//! - [`application`]: session lifecycle and per-session agent orchestration
//! - [`infrastructure`]: process runtime, event bus, configuration loading
//! - [`presentation`]: HTTP routes and the tool bridge

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
