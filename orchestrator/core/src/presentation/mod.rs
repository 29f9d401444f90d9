// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`coral-core`)
//!
//! Surface that translates external requests into session and session-manager
//! calls. **No coordination logic lives here.**
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | HTTP/SSE (Axum) routes |
//! | [`tools`] | Tool declarations and the per-agent tool bridge |
//! | [`format`] | Text rendering of message lists for agents |

pub mod api;
pub mod format;
pub mod tools;
