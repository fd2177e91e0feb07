//! Validated run configuration.
//!
//! The binary parses flags and environment variables; the core only accepts
//! the checked values defined here.

/// Default Oracle listener port.
pub const DEFAULT_PORT: u16 = 1521;

/// Default number of database sessions kept by the Oracle source.
pub const DEFAULT_MAX_SESSIONS: usize = 8;

/// Configuration error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required parameter is empty.
    Missing(&'static str),
    /// SYSDBA and SYSOPER were both requested.
    ConflictingRoles,
    /// A parameter is out of range.
    Invalid { name: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{} must be set", name),
            ConfigError::ConflictingRoles => {
                write!(f, "SYSDBA and SYSOPER cannot be requested together")
            }
            ConfigError::Invalid { name, reason } => write!(f, "invalid {}: {}", name, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Administrative privilege requested for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Normal,
    SysDba,
    SysOper,
}

impl Role {
    /// Builds the role from the two CLI switches.
    pub fn from_flags(sys_dba: bool, sys_oper: bool) -> Result<Self, ConfigError> {
        match (sys_dba, sys_oper) {
            (true, true) => Err(ConfigError::ConflictingRoles),
            (true, false) => Ok(Role::SysDba),
            (false, true) => Ok(Role::SysOper),
            (false, false) => Ok(Role::Normal),
        }
    }
}

/// Database connection parameters.
#[derive(Clone, PartialEq)]
pub struct ConnectionParams {
    pub hostname: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub max_sessions: usize,
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

impl ConnectionParams {
    /// Checks required fields and ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Missing("hostname"));
        }
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Missing("service name"));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Missing("username"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                name: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid {
                name: "max sessions",
                reason: "at least one session is required".to_string(),
            });
        }
        Ok(())
    }

    /// Easy Connect string: `host:port/service`.
    pub fn connect_string(&self) -> String {
        format!("{}:{}/{}", self.hostname, self.port, self.service_name)
    }
}

/// Which pipelines run and how much they emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionOptions {
    /// Only metrics were requested.
    pub metrics: bool,
    /// Only inventory was requested.
    pub inventory: bool,
    /// Emit PGA and sysmetric rows that have no curated metric name.
    pub extended_metrics: bool,
}

impl CollectionOptions {
    /// Neither flag set means "collect everything".
    pub fn all(&self) -> bool {
        !self.metrics && !self.inventory
    }

    pub fn collect_metrics(&self) -> bool {
        self.all() || self.metrics
    }

    pub fn collect_inventory(&self) -> bool {
        self.all() || self.inventory
    }
}
