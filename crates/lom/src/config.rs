//! Configuration Module - Object Model Tuning Parameters
//!
//! Manages all configuration parameters for the object model. Most
//! parameters have sensible defaults; validation runs once at runtime
//! creation.

/// Main configuration for the object model runtime
///
/// # Examples
///
/// ```rust
/// use lom::LomConfig;
///
/// // Use default configuration
/// let config = LomConfig::default();
/// assert!(config.validate().is_ok());
///
/// // Custom configuration for small transfer queues
/// let config = LomConfig {
///     queue_capacity: 8,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LomConfig {
    /// Capacity of transfer queues created by the runtime
    ///
    /// A push into a full queue blocks the calling thread until a pop makes
    /// room or the queue is interrupted.
    ///
    /// Default: `8 * num_cpus`, clamped to `[32, 1024]`
    pub queue_capacity: usize,

    /// Maximum element count accepted when packing or unpacking a tuple
    ///
    /// A decoded element count above this limit is treated as buffer
    /// corruption rather than an allocation request.
    ///
    /// Default: 65536
    pub max_tuple_len: usize,

    /// Registry size at which a warning is logged
    ///
    /// Registered identifiers that are never dereferenced accumulate for the
    /// life of the process. The warning makes that growth visible.
    ///
    /// Default: 10000
    pub registry_warn_threshold: usize,

    /// Log lifecycle events at info level
    ///
    /// Default: false
    pub verbose: bool,

    /// Collect operation statistics
    ///
    /// Default: true
    pub stats_enabled: bool,
}

impl Default for LomConfig {
    fn default() -> Self {
        let cpus = num_cpus::get();

        LomConfig {
            queue_capacity: (cpus * 8).clamp(32, 1024),
            max_tuple_len: 65_536,
            registry_warn_threshold: 10_000,
            verbose: false,
            stats_enabled: true,
        }
    }
}

impl LomConfig {
    /// Validate configuration
    ///
    /// Checks that all values are in valid ranges. Returns the first
    /// violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(
                "queue_capacity must be > 0".to_string(),
            ));
        }

        if self.max_tuple_len == 0 {
            return Err(ConfigError::InvalidTupleLimit(
                "max_tuple_len must be > 0".to_string(),
            ));
        }

        if self.registry_warn_threshold == 0 {
            return Err(ConfigError::InvalidRegistryThreshold(
                "registry_warn_threshold must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - `LOM_QUEUE_CAPACITY`
    /// - `LOM_MAX_TUPLE_LEN`
    /// - `LOM_REGISTRY_WARN`
    /// - `LOM_VERBOSE`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LOM_QUEUE_CAPACITY") {
            if let Ok(capacity) = val.parse::<usize>() {
                config.queue_capacity = capacity;
            }
        }

        if let Ok(val) = std::env::var("LOM_MAX_TUPLE_LEN") {
            if let Ok(limit) = val.parse::<usize>() {
                config.max_tuple_len = limit;
            }
        }

        if let Ok(val) = std::env::var("LOM_REGISTRY_WARN") {
            if let Ok(threshold) = val.parse::<usize>() {
                config.registry_warn_threshold = threshold;
            }
        }

        if let Ok(val) = std::env::var("LOM_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid queue capacity: {0}")]
    InvalidQueueCapacity(String),

    #[error("Invalid tuple limit: {0}")]
    InvalidTupleLimit(String),

    #[error("Invalid registry threshold: {0}")]
    InvalidRegistryThreshold(String),
}
