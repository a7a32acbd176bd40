//! File-based configuration for hosts and the CLI.
//!
//! ```toml
//! [sandbox]
//! timeout_ms = 2000
//! memory_limit_bytes = 52428800   # 0 disables the ceiling
//! cpu_limit_secs = 3              # optional; derived from timeout_ms
//!
//! [trace]
//! max_repr_chars = 200
//! max_steps = 10000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, TraceboxError};
use crate::sandbox::{ExecutionOptions, DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIMEOUT_MS};
use crate::trace::TraceLimits;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceboxConfig {
    pub sandbox: SandboxSection,
    pub trace: TraceLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxSection {
    pub timeout_ms: u64,
    /// Worker address-space ceiling; `0` runs without one.
    pub memory_limit_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_limit_secs: Option<u64>,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            cpu_limit_secs: None,
        }
    }
}

impl TraceboxConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| TraceboxError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sandbox.timeout_ms == 0 {
            return Err(TraceboxError::InvalidConfig(
                "sandbox.timeout_ms must be positive".to_string(),
            ));
        }
        if self.sandbox.cpu_limit_secs == Some(0) {
            return Err(TraceboxError::InvalidConfig(
                "sandbox.cpu_limit_secs must be positive".to_string(),
            ));
        }
        if self.trace.max_repr_chars == 0 {
            return Err(TraceboxError::InvalidConfig(
                "trace.max_repr_chars must be positive".to_string(),
            ));
        }
        if self.trace.max_steps == 0 {
            return Err(TraceboxError::InvalidConfig(
                "trace.max_steps must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Options for an execution that requested no particular step.
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            timeout_ms: self.sandbox.timeout_ms,
            memory_limit_bytes: (self.sandbox.memory_limit_bytes > 0)
                .then_some(self.sandbox.memory_limit_bytes),
            cpu_limit_secs: self.sandbox.cpu_limit_secs,
            trace: self.trace,
            step_index: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TraceboxConfig::from_toml_str("").unwrap();
        assert_eq!(config, TraceboxConfig::default());
        assert_eq!(config.execution_options(), ExecutionOptions::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = TraceboxConfig::from_toml_str(
            "[sandbox]\ntimeout_ms = 500\n\n[trace]\nmax_repr_chars = 40\n",
        )
        .unwrap();
        assert_eq!(config.sandbox.timeout_ms, 500);
        assert_eq!(config.sandbox.memory_limit_bytes, DEFAULT_MEMORY_LIMIT_BYTES);
        assert_eq!(config.trace.max_repr_chars, 40);
        assert_eq!(config.trace.max_steps, crate::trace::DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_zero_memory_limit_disables_ceiling() {
        let config =
            TraceboxConfig::from_toml_str("[sandbox]\nmemory_limit_bytes = 0\n").unwrap();
        assert_eq!(config.execution_options().memory_limit_bytes, None);
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let err = TraceboxConfig::from_toml_str("[sandbox]\ntimeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, TraceboxError::InvalidConfig(_)));
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_validation_rejects_zero_repr_cap() {
        let err = TraceboxConfig::from_toml_str("[trace]\nmax_repr_chars = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_repr_chars"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = TraceboxConfig::from_toml_str("[sandbox]\ntimeout = 5\n").unwrap_err();
        assert!(matches!(err, TraceboxError::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sandbox]\ntimeout_ms = 750\ncpu_limit_secs = 2").unwrap();
        let config = TraceboxConfig::load(file.path()).unwrap();
        let options = config.execution_options();
        assert_eq!(options.timeout_ms, 750);
        assert_eq!(options.cpu_limit_secs, Some(2));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TraceboxConfig::load(Path::new("/nonexistent/tracebox.toml")).unwrap_err();
        assert!(matches!(err, TraceboxError::ConfigRead { .. }));
    }
}
