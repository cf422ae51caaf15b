//! Engine configuration
//!
//! Expected values and allow-lists are read once, up front, and handed to
//! the controls that need them. Nothing reads the process environment
//! while a scan is running.

use crate::error::ConfigError;
use crate::model::ControlId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// How the orchestrator schedules controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One control at a time, in order
    Sequential,
    /// All controls in flight at once; results still in order
    #[default]
    Concurrent,
}

impl FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" | "parallel" => Ok(Self::Concurrent),
            other => Err(ConfigError::InvalidValue {
                key: "ZT_EXECUTION".into(),
                value: other.into(),
            }),
        }
    }
}

/// Configuration consumed by the controls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Resource types each allow-listed control inspects
    pub supported_types: HashMap<ControlId, Vec<String>>,
    /// Expected DNS servers keyed by upper-case environment tag
    pub expected_dns: HashMap<String, Vec<String>>,
    /// Expected peer VNet ids keyed by upper-case environment tag
    pub expected_peers: HashMap<String, Vec<String>>,
    /// Scheduling of the controls
    pub execution: ExecutionMode,
}

/// On-disk layout; control names are plain keys
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    supported_types: HashMap<String, Vec<String>>,
    expected_dns: HashMap<String, Vec<String>>,
    expected_peers: HashMap<String, Vec<String>>,
    execution: ExecutionMode,
}

const DIAG_TYPES_KEY: &str = "DIAG_SUPPORTED_TYPES";
const CMK_TYPES_KEY: &str = "CMK_SUPPORTED_TYPES";
const LEGACY_CMK_TYPES_KEY: &str = "MMK_SUPPORTED_TYPES";
const DNS_PREFIX: &str = "DNS_IPS_";
const PEERS_SUFFIX: &str = "_REMOTE_VNET_IDS";
const EXECUTION_KEY: &str = "ZT_EXECUTION";

impl EngineConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load from `KEY=value` pairs
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        let mut legacy_cmk = None;

        for (k, v) in vars {
            let k = k.as_ref().trim().to_uppercase();
            let v = v.as_ref();

            if k == DIAG_TYPES_KEY {
                config.supported_types.insert(ControlId::Diagnostics, split_list(v));
            } else if k == CMK_TYPES_KEY {
                config.supported_types.insert(ControlId::CmkEncryption, split_list(v));
            } else if k == LEGACY_CMK_TYPES_KEY {
                legacy_cmk = Some(split_list(v));
            } else if k == EXECUTION_KEY {
                config.execution = v.parse()?;
            } else if let Some(env) = k.strip_prefix(DNS_PREFIX).filter(|e| !e.is_empty()) {
                config.expected_dns.insert(env.to_string(), split_list(v));
            } else if let Some(env) = k.strip_suffix(PEERS_SUFFIX).filter(|e| !e.is_empty()) {
                config.expected_peers.insert(env.to_string(), split_list(v));
            }
        }

        if let Some(types) = legacy_cmk {
            config
                .supported_types
                .entry(ControlId::CmkEncryption)
                .or_insert(types);
        }

        tracing::debug!(
            "Loaded engine config: {} allow-lists, {} DNS environments, {} peering environments",
            config.supported_types.len(),
            config.expected_dns.len(),
            config.expected_peers.len()
        );
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: ConfigFile = toml::from_str(content)?;

        let mut supported_types = HashMap::new();
        for (control, types) in raw.supported_types {
            let id = control.parse::<ControlId>().map_err(|_| ConfigError::InvalidValue {
                key: "supported_types".into(),
                value: control.clone(),
            })?;
            supported_types.insert(id, dedup(types));
        }

        let upper = |m: HashMap<String, Vec<String>>| -> HashMap<String, Vec<String>> {
            m.into_iter()
                .map(|(k, v)| (k.trim().to_uppercase(), dedup(v)))
                .collect()
        };
        Ok(Self {
            supported_types,
            expected_dns: upper(raw.expected_dns),
            expected_peers: upper(raw.expected_peers),
            execution: raw.execution,
        })
    }

    /// Allow-list for a control; empty when unconfigured
    pub fn supported_types(&self, control: ControlId) -> &[String] {
        self.supported_types
            .get(&control)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `control` inspects `resource_type`
    pub fn is_supported(&self, control: ControlId, resource_type: &str) -> bool {
        self.supported_types(control)
            .iter()
            .any(|t| t.eq_ignore_ascii_case(resource_type))
    }

    /// Expected DNS servers for an environment; empty when unconfigured
    pub fn expected_dns(&self, environment: &str) -> &[String] {
        self.expected_dns
            .get(&environment.trim().to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Expected peer VNet ids for an environment; empty when unconfigured
    pub fn expected_peers(&self, environment: &str) -> &[String] {
        self.expected_peers
            .get(&environment.trim().to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace the allow-list of `control`
    pub fn with_supported_types<I, S>(mut self, control: ControlId, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_types
            .insert(control, dedup(types.into_iter().map(Into::into).collect()));
        self
    }

    /// Replace an environment's expected DNS servers
    pub fn with_expected_dns<I, S>(mut self, environment: &str, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_dns.insert(
            environment.trim().to_uppercase(),
            dedup(ips.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Replace an environment's expected peer VNets
    pub fn with_expected_peers<I, S>(mut self, environment: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_peers.insert(
            environment.trim().to_uppercase(),
            dedup(ids.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Set the scheduling mode
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }
}

fn split_list(value: &str) -> Vec<String> {
    dedup(value.split(',').map(str::to_string).collect())
}

/// Trim, drop blanks and repeats, keep first-seen order
fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim();
        if !v.is_empty() && !out.iter().any(|o| o == v) {
            out.push(v.to_string());
        }
    }
    out
}
