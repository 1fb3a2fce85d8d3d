//! Structured logging utilities for snap-preload components.
//!
//! Every event carries a `component` field so output from the preload
//! library can be told apart from the host application's own logging.
//!
//! # Usage
//!
//! ```ignore
//! use snap_preload_config::log_shm_debug;
//!
//! log_shm_debug!("shm name rewritten", from = "/cache", to = "/snap.app.cache");
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const PRELOAD: &'static str = "PRELOAD";
    pub const IDENTITY: &'static str = "IDENTITY";
    pub const GROUPS: &'static str = "GROUPS";
    pub const SHM: &'static str = "SHM";
    pub const SEM: &'static str = "SEM";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Case-insensitive parse; `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === PRELOAD logging macros ===

#[macro_export]
macro_rules! log_preload_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(target: "snap_preload", component = $crate::logging::Component::PRELOAD, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_preload_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(target: "snap_preload", component = $crate::logging::Component::PRELOAD, $($key = $value,)* $msg)
    };
}

// === IDENTITY logging macros ===

#[macro_export]
macro_rules! log_identity_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(target: "snap_preload", component = $crate::logging::Component::IDENTITY, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_identity_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(target: "snap_preload", component = $crate::logging::Component::IDENTITY, $($key = $value,)* $msg)
    };
}

// === GROUPS logging macros ===

#[macro_export]
macro_rules! log_groups_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(target: "snap_preload", component = $crate::logging::Component::GROUPS, $($key = $value,)* $msg)
    };
}

// === SHM logging macros ===

#[macro_export]
macro_rules! log_shm_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(target: "snap_preload", component = $crate::logging::Component::SHM, $($key = $value,)* $msg)
    };
}

// === SEM logging macros ===

#[macro_export]
macro_rules! log_sem_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(target: "snap_preload", component = $crate::logging::Component::SEM, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_sem_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(target: "snap_preload", component = $crate::logging::Component::SEM, $($key = $value,)* $msg)
    };
}

/// Initialize logging to stderr with the given level filter.
///
/// Uses `try_init`: when the host application already installed a global
/// subscriber, that one is kept and our events flow into it.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::new(format!("snap_preload={}", level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .without_time()
        .try_init();
}
