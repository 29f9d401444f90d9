// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod orchestrator;
pub mod session_manager;

pub use orchestrator::Orchestrator;
pub use session_manager::{SessionManager, SessionManagerError};
