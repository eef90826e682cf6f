use tracing::trace;

const NEXUS_HOST: &str = "NEXUS_HOST";
const NEXUS_PORT: &str = "NEXUS_PORT";
const NEXUS_TELEMETRY_INTERVAL: &str = "NEXUS_TELEMETRY_INTERVAL";

/// Configuration of a probe: where its nexus lives and how often the
/// periodic gauges are pushed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ProbeConfig {
    pub nexus_host: String,
    pub nexus_port: u16,

    /// Seconds between telemetry samples
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval: u64,
}

fn default_telemetry_interval() -> u64 {
    15
}

impl ProbeConfig {
    pub fn new(nexus_host: impl Into<String>, nexus_port: u16) -> Self {
        Self {
            nexus_host: nexus_host.into(),
            nexus_port,
            telemetry_interval: default_telemetry_interval(),
        }
    }

    /// Reads the configuration from the environment (a `.env` file is
    /// honored). Missing or unparsable values fall back to defaults, an
    /// absent host stays empty and fails [`validate`](Self::validate).
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            nexus_host: std::env::var(NEXUS_HOST).unwrap_or_default(),
            nexus_port: std::env::var(NEXUS_PORT)
                .map_or(0, |value| value.parse().unwrap_or(0)),
            telemetry_interval: std::env::var(NEXUS_TELEMETRY_INTERVAL).map_or_else(
                |_| default_telemetry_interval(),
                |value| value.parse().unwrap_or_else(|_| default_telemetry_interval()),
            ),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.nexus_host.is_empty() {
            anyhow::bail!("no nexus host configured");
        }
        if self.nexus_port == 0 {
            anyhow::bail!("no nexus port configured");
        }
        Ok(())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<ProbeConfig> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
