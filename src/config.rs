//! Ingestion Configuration
//!
//! Settings shared by every connection of the endpoint. A single
//! `IngestConfig` is built at startup, validated, wrapped in an `Arc`
//! and handed to each connection at construction time. Connections only
//! ever read it.
//!
//! ## Buffer Sizing
//!
//! ```text
//!  chunk_size           chunk_size           chunk_size
//! ├────────────────────┼────────────────────┼────────────────────┤ ...
//! │ initial allocation │ first growth step  │ second growth step │
//! └────────────────────┴────────────────────┴────────────────────┘
//!                                                     ▲
//!                     buffer_size_ceiling ────────────┘ growth past here
//!                                                       closes the connection
//! ```
//!
//! Growth steps default to `chunk_size` and can be sized separately with
//! `growth_chunk_size`. The largest capacity a buffer actually reaches is
//! the initial chunk plus as many whole steps as fit under the ceiling,
//! and a record of `max_record_size` bytes plus its `\r\n` terminator must
//! fit in it.

use thiserror::Error;

/// Default size of the initial buffer and of every growth step (32 KB)
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Default per-connection buffer ceiling (6 MB)
pub const DEFAULT_BUFFER_SIZE_CEILING: usize = 6 * 1024 * 1024;

/// Default maximum length of a single record (1 MB)
pub const DEFAULT_MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Default number of readiness events fetched per poll
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Longest record terminator (`\r\n`)
pub const MAX_TERMINATOR_LEN: usize = 2;

/// Errors produced while building or validating the configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("buffer ceiling ({ceiling} bytes) is smaller than one chunk ({chunk} bytes)")]
    CeilingBelowChunk { ceiling: usize, chunk: usize },

    #[error(
        "max record size ({record} bytes) plus its terminator does not fit the largest buffer ({capacity} bytes)"
    )]
    RecordAboveCeiling { record: usize, capacity: usize },

    #[error("event capacity must be greater than zero")]
    ZeroEventCapacity,

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Run the endpoint with this configuration
    Run(IngestConfig),
    /// Print usage and exit
    Help,
    /// Print the version and exit
    Version,
}

/// Configuration shared by all connections.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Initial buffer size, and the increment of every growth step
    /// unless `growth_chunk_size` is set
    pub chunk_size: usize,

    /// Increment of every growth step, if different from `chunk_size`
    pub growth_chunk_size: Option<usize>,

    /// Maximum total buffer capacity per connection
    pub buffer_size_ceiling: usize,

    /// Longest record the line processor accepts
    pub max_record_size: usize,

    /// Readiness events fetched per poll
    pub event_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            growth_chunk_size: None,
            buffer_size_ceiling: DEFAULT_BUFFER_SIZE_CEILING,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl IngestConfig {
    /// Checks the sizing rules the connection buffer relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.growth_chunk() == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.buffer_size_ceiling < self.chunk_size {
            return Err(ConfigError::CeilingBelowChunk {
                ceiling: self.buffer_size_ceiling,
                chunk: self.chunk_size,
            });
        }
        let capacity = self.max_buffer_capacity();
        let fits = self
            .max_record_size
            .checked_add(MAX_TERMINATOR_LEN)
            .is_some_and(|needed| needed <= capacity);
        if !fits {
            return Err(ConfigError::RecordAboveCeiling {
                record: self.max_record_size,
                capacity,
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        Ok(())
    }

    /// Size of every growth step.
    #[inline]
    pub fn growth_chunk(&self) -> usize {
        self.growth_chunk_size.unwrap_or(self.chunk_size)
    }

    /// The largest capacity a connection buffer can reach without
    /// passing the ceiling.
    pub fn max_buffer_capacity(&self) -> usize {
        let growth = self.growth_chunk();
        if growth == 0 || self.buffer_size_ceiling < self.chunk_size {
            return self.chunk_size.min(self.buffer_size_ceiling);
        }
        let steps = (self.buffer_size_ceiling - self.chunk_size) / growth;
        self.chunk_size + steps * growth
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses command-line arguments (without the program name).
    ///
    /// The returned configuration has already been validated.
    pub fn from_args<I>(args: I) -> Result<CliCommand, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = IngestConfig::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = next_value(&mut args, &arg)?;
                }
                "--port" | "-p" => {
                    let value = next_value(&mut args, &arg)?;
                    config.port = value.parse().map_err(|_| invalid(&arg, &value))?;
                }
                "--chunk-size" => {
                    let value = next_value(&mut args, &arg)?;
                    config.chunk_size = parse_size(&value).ok_or_else(|| invalid(&arg, &value))?;
                }
                "--growth-size" => {
                    let value = next_value(&mut args, &arg)?;
                    config.growth_chunk_size =
                        Some(parse_size(&value).ok_or_else(|| invalid(&arg, &value))?);
                }
                "--buffer-max-size" => {
                    let value = next_value(&mut args, &arg)?;
                    config.buffer_size_ceiling =
                        parse_size(&value).ok_or_else(|| invalid(&arg, &value))?;
                }
                "--max-record-size" => {
                    let value = next_value(&mut args, &arg)?;
                    config.max_record_size =
                        parse_size(&value).ok_or_else(|| invalid(&arg, &value))?;
                }
                "--help" => return Ok(CliCommand::Help),
                "--version" | "-v" => return Ok(CliCommand::Version),
                _ => return Err(ConfigError::UnknownArgument(arg.clone())),
            }
        }

        config.validate()?;
        Ok(CliCommand::Run(config))
    }
}

fn next_value<I>(args: &mut I, flag: &str) -> Result<String, ConfigError>
where
    I: Iterator<Item = String>,
{
    args.next()
        .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn invalid(flag: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    }
}

/// Parses a byte size such as `4096`, `32K` or `6M`.
pub fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    let (digits, multiplier) = match value.char_indices().last()? {
        (idx, 'k' | 'K') => (&value[..idx], 1024),
        (idx, 'm' | 'M') => (&value[..idx], 1024 * 1024),
        _ => (value, 1),
    };
    digits.parse::<usize>().ok()?.checked_mul(multiplier)
}
