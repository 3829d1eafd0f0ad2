//! Docker backend configuration

/// Configuration for the docker backend
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path to the docker executable
    ///
    /// Defaults to "docker" (assumes it's on PATH).
    pub binary: String,

    /// Daemon address passed as `--host`; the CLI default is used when absent
    pub host: Option<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            host: None,
        }
    }
}

impl DockerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}
