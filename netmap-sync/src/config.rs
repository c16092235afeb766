//! YAML configuration document model.
//!
//! The same structs serve both directions: parsing an operator-written
//! document and serializing a synthesized one, so captured output always
//! round-trips through the loader.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid YAML for this schema.
    #[error("failed to parse config document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub links: BTreeMap<String, LinkConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub netmap6: BTreeMap<String, MappingSetConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat66: Option<NatConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat44: Option<NatConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radv: Option<RadvSection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingSetConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "pfx-pub", skip_serializing_if = "String::is_empty")]
    pub pfx_pub: String,
    #[serde(default, rename = "pfx-priv", skip_serializing_if = "String::is_empty")]
    pub pfx_priv: String,
    #[serde(default)]
    pub maps: Vec<MapEntry>,
}

/// One mapping pair in its document form.
///
/// `pair` is a heterogeneous array: `[public, private]` or
/// `[public, private, preference, lifetime]` when the mapping should also be
/// advertised as a route.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MapEntry {
    #[serde(default)]
    pub pair: Vec<serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NatConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "mss-clamping")]
    pub mss_clamping: bool,
    #[serde(default)]
    pub mss: i64,
    #[serde(default)]
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RadvSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "adv-interval", skip_serializing_if = "Vec::is_empty")]
    pub adv_interval: Vec<i64>,
    #[serde(default)]
    pub lifetime: i64,
    #[serde(default)]
    pub dhcp: bool,
    #[serde(default)]
    pub prefixes: Vec<PrefixEntry>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rdnss: Vec<RdnssEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrefixEntry {
    #[serde(default)]
    pub prefix: String,
    #[serde(default, rename = "on-link")]
    pub on_link: bool,
    #[serde(default)]
    pub auto: bool,
    #[serde(default, rename = "adv-addr")]
    pub adv_addr: bool,
    /// `[valid, preferred]` seconds; defaults applied while building links.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lifetime: Vec<i64>,
}

/// One advertised route in its document form: `[prefix, preference,
/// lifetime]` with the tail elements optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteEntry {
    #[serde(default)]
    pub route: Vec<serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RdnssEntry {
    #[serde(default)]
    pub server: Vec<String>,
    #[serde(default)]
    pub lifetime: i64,
}

/// Parse a configuration document from `path`.
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&data)?)
}
