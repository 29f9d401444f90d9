// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Session aggregate and the value types around it.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Agents, threads, messages, agent graphs, runtimes and the
//!   per-session coordination state

pub mod agent;
pub mod app_config;
pub mod connection;
pub mod events;
pub mod graph;
pub mod options;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod thread;
