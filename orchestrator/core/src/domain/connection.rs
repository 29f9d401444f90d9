// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Everything except RFC 3986 unreserved characters is escaped, so an id can
/// sit in a path segment or a query value without changing the URL structure.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Where spawned agents dial back into this server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: "http".to_string(),
            host: host.into(),
            port,
        }
    }

    /// `{scheme}://{host}:{port}[/devmode]/{app}/{key}/{session}/sse?agentId={agent}`
    /// with every id percent-encoded.
    pub fn connection_url(
        &self,
        application_id: &str,
        privacy_key: &str,
        session_id: &str,
        agent_name: &str,
        dev_mode: bool,
    ) -> String {
        let prefix = if dev_mode { "/devmode" } else { "" };
        format!(
            "{}://{}:{}{}/{}/{}/{}/sse?agentId={}",
            self.scheme,
            self.host,
            self.port,
            prefix,
            utf8_percent_encode(application_id, COMPONENT),
            utf8_percent_encode(privacy_key, COMPONENT),
            utf8_percent_encode(session_id, COMPONENT),
            utf8_percent_encode(agent_name, COMPONENT)
        )
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new("127.0.0.1", 5555)
    }
}
