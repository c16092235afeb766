//! Advertisement daemon configuration: parsing and rendering of
//! brace-delimited interface blocks.
//!
//! Parsing runs over a token stream with an explicit brace-depth counter, so
//! unbalanced input fails with an error instead of silently truncating.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::link::{Link, Radv, RadvPrefix, RadvRoute};

/// Default location of the advertisement daemon config.
pub const RADVD_CONF_PATH: &str = "/etc/radvd.conf";

/// Errors raised while reading or parsing an advertisement config.
#[derive(Debug, Error)]
pub enum RadvdError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed advertisement config: {0}")]
    Malformed(String),
}

/// One parsed `interface` block with daemon defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RadvdInterface {
    pub send_advert: bool,
    pub managed_flag: bool,
    pub min_interval: i64,
    pub max_interval: i64,
    pub default_lifetime: i64,
    pub prefixes: Vec<RadvPrefix>,
    pub routes: Vec<RadvRoute>,
}

impl Default for RadvdInterface {
    fn default() -> Self {
        Self {
            send_advert: true,
            managed_flag: false,
            min_interval: 30,
            max_interval: 60,
            default_lifetime: 180,
            prefixes: Vec::new(),
            routes: Vec::new(),
        }
    }
}

/// Read and parse an advertisement config file. A missing file parses as
/// empty.
pub fn load_radvd_conf(path: &Path) -> Result<BTreeMap<String, RadvdInterface>, RadvdError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path).map_err(|source| RadvdError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_radvd_conf(&content)
}

/// Parse advertisement config text into per-interface settings.
pub fn parse_radvd_conf(content: &str) -> Result<BTreeMap<String, RadvdInterface>, RadvdError> {
    let tokens = tokenize(content);
    let mut interfaces = BTreeMap::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "interface" {
            let name = tokens
                .get(i + 1)
                .cloned()
                .ok_or_else(|| RadvdError::Malformed("interface without a name".to_string()))?;
            let (block, next) = collect_block(&tokens, i + 2)?;
            interfaces.insert(name, parse_interface_block(&block)?);
            i = next;
        } else {
            i += 1;
        }
    }
    Ok(interfaces)
}

/// Split config text into words with `{`, `}`, and `;` as their own tokens.
/// Comments run from `#` to end of line.
fn tokenize(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("");
        let mut current = String::new();
        for ch in line.chars() {
            match ch {
                '{' | '}' | ';' => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                    tokens.push(ch.to_string());
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens
}

/// Collect the tokens of one `{ ... }` block. `start` must point at the
/// opening brace; nested blocks are tracked with a depth counter. Returns
/// the inner tokens and the index just past the closing brace.
fn collect_block(tokens: &[String], start: usize) -> Result<(Vec<String>, usize), RadvdError> {
    if tokens.get(start).map(String::as_str) != Some("{") {
        return Err(RadvdError::Malformed(
            "expected '{' to open a block".to_string(),
        ));
    }
    let mut depth = 1usize;
    let mut block = Vec::new();
    let mut i = start + 1;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "{" => {
                depth += 1;
                block.push(tokens[i].clone());
            }
            "}" => {
                depth -= 1;
                if depth == 0 {
                    return Ok((block, i + 1));
                }
                block.push(tokens[i].clone());
            }
            _ => block.push(tokens[i].clone()),
        }
        i += 1;
    }
    Err(RadvdError::Malformed(
        "unbalanced braces in block".to_string(),
    ))
}

fn parse_interface_block(tokens: &[String]) -> Result<RadvdInterface, RadvdError> {
    let mut iface = RadvdInterface::default();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "prefix" => {
                let prefix = tokens
                    .get(i + 1)
                    .cloned()
                    .ok_or_else(|| RadvdError::Malformed("prefix without a value".to_string()))?;
                let (block, next) = collect_block(tokens, i + 2)?;
                iface.prefixes.push(parse_prefix_block(prefix, &block));
                i = next;
            }
            "route" => {
                let prefix = tokens
                    .get(i + 1)
                    .cloned()
                    .ok_or_else(|| RadvdError::Malformed("route without a prefix".to_string()))?;
                let (block, next) = collect_block(tokens, i + 2)?;
                iface.routes.push(parse_route_block(prefix, &block));
                i = next;
            }
            "AdvSendAdvert" => {
                iface.send_advert = on_value(tokens, i);
                i = skip_statement(tokens, i);
            }
            "AdvManagedFlag" => {
                iface.managed_flag = on_value(tokens, i);
                i = skip_statement(tokens, i);
            }
            "MinRtrAdvInterval" => {
                iface.min_interval = number_value(tokens, i, iface.min_interval);
                i = skip_statement(tokens, i);
            }
            "MaxRtrAdvInterval" => {
                iface.max_interval = number_value(tokens, i, iface.max_interval);
                i = skip_statement(tokens, i);
            }
            "AdvDefaultLifetime" => {
                iface.default_lifetime = number_value(tokens, i, iface.default_lifetime);
                i = skip_statement(tokens, i);
            }
            ";" => i += 1,
            _ => {
                // Unknown directives may carry their own block (RDNSS,
                // clients, ...). Consume the whole block, otherwise skip one
                // statement.
                if let Some(open) = tokens[i..].iter().position(|t| t == "{" || t == ";") {
                    if tokens[i + open] == "{" {
                        let (_, next) = collect_block(tokens, i + open)?;
                        i = next;
                    } else {
                        i = i + open + 1;
                    }
                } else {
                    i = tokens.len();
                }
            }
        }
    }
    Ok(iface)
}

fn parse_prefix_block(prefix: String, tokens: &[String]) -> RadvPrefix {
    let mut out = RadvPrefix {
        prefix,
        on_link: true,
        autonomous: true,
        router_addr: false,
        valid_lifetime: 1800,
        preferred_lifetime: 900,
    };
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "AdvOnLink" => out.on_link = on_value(tokens, i),
            "AdvAutonomous" => out.autonomous = on_value(tokens, i),
            "AdvRouterAddr" => out.router_addr = on_value(tokens, i),
            "AdvValidLifetime" => out.valid_lifetime = number_value(tokens, i, out.valid_lifetime),
            "AdvPreferredLifetime" => {
                out.preferred_lifetime = number_value(tokens, i, out.preferred_lifetime)
            }
            _ => {}
        }
        i = skip_statement(tokens, i);
    }
    out
}

fn parse_route_block(prefix: String, tokens: &[String]) -> RadvRoute {
    let mut route = RadvRoute {
        prefix,
        preference: "medium".to_string(),
        lifetime: 3600,
        metric: 0,
    };
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "AdvRoutePreference" => {
                if let Some(value) = tokens.get(i + 1) {
                    route.preference = value.clone();
                }
            }
            "AdvRouteLifetime" => route.lifetime = number_value(tokens, i, route.lifetime),
            _ => {}
        }
        i = skip_statement(tokens, i);
    }
    route
}

fn on_value(tokens: &[String], i: usize) -> bool {
    tokens.get(i + 1).map(String::as_str) == Some("on")
}

fn number_value(tokens: &[String], i: usize, default: i64) -> i64 {
    tokens
        .get(i + 1)
        .and_then(|t| t.parse().ok())
        .unwrap_or(default)
}

/// Advance past the current statement's terminating `;`.
fn skip_statement(tokens: &[String], mut i: usize) -> usize {
    while i < tokens.len() && tokens[i] != ";" {
        i += 1;
    }
    (i + 1).min(tokens.len())
}

/// Render the advertisement config for every link with advertisements
/// enabled, followed by the contents of any include files.
pub fn render_radvd_conf(links: &[Link]) -> String {
    let mut out = String::new();
    for link in links {
        let Some(radv) = &link.radv else { continue };
        if !radv.enabled {
            continue;
        }
        out.push_str(&render_interface(&link.name, radv, &link.advertised_routes()));
    }

    let mut seen = std::collections::BTreeSet::new();
    for link in links {
        let Some(radv) = &link.radv else { continue };
        if !radv.enabled {
            continue;
        }
        for path in &radv.include {
            if !seen.insert(path.clone()) {
                continue;
            }
            match fs::read_to_string(path) {
                Ok(content) => {
                    out.push_str(&content);
                    if !content.ends_with('\n') {
                        out.push('\n');
                    }
                }
                Err(err) => warn!("skipping include file {path}: {err}"),
            }
        }
    }
    out
}

fn render_interface(name: &str, radv: &Radv, auto_routes: &[RadvRoute]) -> String {
    let mut cfg = String::new();
    cfg.push_str(&format!("interface {name} {{\n"));
    cfg.push_str("    AdvSendAdvert on;\n");
    cfg.push_str(&format!("    MinRtrAdvInterval {};\n", radv.min_interval));
    cfg.push_str(&format!("    MaxRtrAdvInterval {};\n", radv.max_interval));
    cfg.push_str(&format!(
        "    AdvDefaultLifetime {};\n",
        radv.default_lifetime
    ));

    if radv.dhcp {
        cfg.push_str("    AdvManagedFlag on;\n");
        cfg.push_str("    AdvOtherConfigFlag on;\n");
    }

    for prefix in &radv.prefixes {
        cfg.push_str(&format!("    prefix {} {{\n", prefix.prefix));
        cfg.push_str(&format!(
            "        AdvOnLink {};\n",
            on_off(prefix.on_link)
        ));
        cfg.push_str(&format!(
            "        AdvAutonomous {};\n",
            on_off(prefix.autonomous)
        ));
        cfg.push_str(&format!(
            "        AdvRouterAddr {};\n",
            on_off(prefix.router_addr)
        ));
        // Lifetimes only show up when they deviate from the daemon defaults.
        if prefix.valid_lifetime != 1800 {
            cfg.push_str(&format!(
                "        AdvValidLifetime {};\n",
                prefix.valid_lifetime
            ));
        }
        if prefix.preferred_lifetime != 900 {
            cfg.push_str(&format!(
                "        AdvPreferredLifetime {};\n",
                prefix.preferred_lifetime
            ));
        }
        cfg.push_str("    };\n");
    }

    for route in radv.routes.iter().chain(auto_routes) {
        cfg.push_str(&format!(
            "    route {} {{ AdvRoutePreference {}; AdvRouteLifetime {}; }};\n",
            route.prefix, route.preference, route.lifetime
        ));
    }

    for rdnss in &radv.rdnss {
        if rdnss.servers.is_empty() {
            continue;
        }
        cfg.push_str(&format!(
            "    RDNSS {} {{ AdvRDNSSLifetime {}; }};\n",
            rdnss.servers.join(" "),
            rdnss.lifetime
        ));
    }

    cfg.push_str("};\n\n");
    cfg
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Write `content` to `path` when it differs from what is on disk. Returns
/// whether the file changed.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool, RadvdError> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == content {
            return Ok(false);
        }
    }
    fs::write(path, content).map_err(|source| RadvdError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}
