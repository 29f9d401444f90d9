// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod config_loader;
pub mod event_bus;
pub mod runtime;

pub use config_loader::{AppConfigLoader, LoadedConfig};
pub use event_bus::{EventBus, EventReceiver};
pub use runtime::{ExecutableHandle, ExecutableRuntime};
