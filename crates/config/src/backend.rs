use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Backend {
    /// Address of the headless Delve server the agent attaches through,
    /// as `host:port`. Delve must be started with `--accept-multiclient`
    /// and the JSON-RPC 2 API.
    pub address: String,

    /// How long to wait for the TCP connection to the backend before
    /// giving up. **Measured in seconds**.
    ///
    /// ## Note
    ///
    /// This only bounds connection setup. Calls made while the target is
    /// halted are not bounded.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub connect_timeout: Duration,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:45689".to_owned(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}
