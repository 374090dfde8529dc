use thiserror::Error;

/// Fixture error types, grouped by the layer that raised them
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Container engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Service lifecycle error: {0}")]
    Service(#[from] ServiceError),

    #[error("Readiness error: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generic error: {0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found at path: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Host port {port} is already allocated")]
    PortAllocated { port: u16 },

    #[error("Container not found: {name}")]
    ContainerNotFound { name: String },

    #[error("Network not found: {name}")]
    NetworkNotFound { name: String },

    #[error("Image not found: {image}")]
    ImageNotFound { image: String },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Container runtime binary not available: {binary}")]
    RuntimeUnavailable { binary: String },

    #[error("Malformed engine response: {reason}")]
    MalformedResponse { reason: String },
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No free host port found for {name} after {attempts} attempts")]
    PortConflictExhausted { name: String, attempts: u32 },

    #[error("Service {name} has been removed")]
    Removed { name: String },
}

#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("Service at {endpoint} has not started in time ({attempts} attempts)")]
    NotReadyInTime { endpoint: String, attempts: u32 },
}

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Invalid number of instances: {count}")]
    InvalidInstanceCount { count: usize },

    #[error("No ABCI endpoint supplied for a cluster of {count}")]
    MissingAbciEndpoint { count: usize },
}

impl FixtureError {
    /// The engine refused a host port that another process already holds.
    pub fn is_port_conflict(&self) -> bool {
        matches!(self, FixtureError::Engine(EngineError::PortAllocated { .. }))
    }

    pub fn is_port_conflict_exhausted(&self) -> bool {
        matches!(
            self,
            FixtureError::Service(ServiceError::PortConflictExhausted { .. })
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FixtureError::Engine(
                EngineError::ContainerNotFound { .. }
                    | EngineError::NetworkNotFound { .. }
                    | EngineError::ImageNotFound { .. }
            )
        )
    }

    pub fn is_readiness_timeout(&self) -> bool {
        matches!(
            self,
            FixtureError::Readiness(ReadinessError::NotReadyInTime { .. })
        )
    }

    pub fn is_invalid_instance_count(&self) -> bool {
        matches!(
            self,
            FixtureError::Cluster(ClusterError::InvalidInstanceCount { .. })
        )
    }
}

/// Convenience type alias for fixture results
pub type Result<T, E = FixtureError> = std::result::Result<T, E>;
