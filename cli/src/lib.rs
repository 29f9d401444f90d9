// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coral server library: command handlers and the HTTP server bootstrap,
//! exposed so they can be driven from tests.

pub mod commands;
pub mod server;
