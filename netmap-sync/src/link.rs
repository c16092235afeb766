//! Per-link runtime model.
//!
//! Links are built once per run from the configuration document and never
//! mutated afterwards. They are kept in a name-sorted list so rule
//! compilation order is reproducible.

use rule_diff_core::addr;

use crate::config::{Config, LinkConfig, MapEntry, MappingSetConfig, NatConfig, RadvSection};

/// A network link with everything configured for it.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    pub mapping_sets: Vec<MappingSet>,
    pub nat44: Option<NatConfig>,
    pub nat66: Option<NatConfig>,
    pub radv: Option<Radv>,
}

/// A named set of 1:1 address mappings.
#[derive(Debug, Clone)]
pub struct MappingSet {
    pub name: String,
    pub enabled: bool,
    pub pfx_pub: String,
    pub pfx_priv: String,
    pub pairs: Vec<MapPair>,
}

/// One public/private address correspondence.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPair {
    pub public: String,
    pub private: String,
    /// Present when the mapping should also be advertised as a route.
    pub radv: Option<RadvAnnotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadvAnnotation {
    pub preference: String,
    pub lifetime: i64,
}

/// Router-advertisement settings with document defaults applied.
#[derive(Debug, Clone)]
pub struct Radv {
    pub enabled: bool,
    pub min_interval: i64,
    pub max_interval: i64,
    pub default_lifetime: i64,
    pub dhcp: bool,
    pub prefixes: Vec<RadvPrefix>,
    pub routes: Vec<RadvRoute>,
    pub rdnss: Vec<Rdnss>,
    pub include: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadvPrefix {
    pub prefix: String,
    pub on_link: bool,
    pub autonomous: bool,
    pub router_addr: bool,
    pub valid_lifetime: i64,
    pub preferred_lifetime: i64,
}

/// An advertised route, whether configured manually, derived from a mapping
/// annotation, or read back from a live advertisement config.
#[derive(Debug, Clone, PartialEq)]
pub struct RadvRoute {
    pub prefix: String,
    pub preference: String,
    pub lifetime: i64,
    pub metric: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rdnss {
    pub servers: Vec<String>,
    pub lifetime: i64,
}

/// Build the link list from a parsed configuration, sorted by name.
pub fn build_links(config: &Config) -> Vec<Link> {
    config
        .network
        .links
        .iter()
        .map(|(name, cfg)| build_link(name, cfg))
        .collect()
}

fn build_link(name: &str, cfg: &LinkConfig) -> Link {
    Link {
        name: name.to_string(),
        mapping_sets: cfg
            .netmap6
            .iter()
            .map(|(set_name, set_cfg)| build_mapping_set(set_name, set_cfg))
            .collect(),
        nat44: cfg.nat44.clone(),
        nat66: cfg.nat66.clone(),
        radv: cfg.radv.as_ref().map(build_radv),
    }
}

fn build_mapping_set(name: &str, cfg: &MappingSetConfig) -> MappingSet {
    MappingSet {
        name: name.to_string(),
        enabled: cfg.enabled,
        pfx_pub: cfg.pfx_pub.clone(),
        pfx_priv: cfg.pfx_priv.clone(),
        pairs: cfg.maps.iter().filter_map(build_pair).collect(),
    }
}

fn build_pair(entry: &MapEntry) -> Option<MapPair> {
    if entry.pair.len() < 2 {
        return None;
    }
    let public = entry.pair[0].as_str().unwrap_or_default().to_string();
    let private = entry.pair[1].as_str().unwrap_or_default().to_string();
    let radv = if entry.pair.len() >= 4 {
        Some(RadvAnnotation {
            preference: entry.pair[2].as_str().unwrap_or("medium").to_string(),
            lifetime: entry.pair[3].as_i64().unwrap_or(3600),
        })
    } else {
        None
    };
    Some(MapPair {
        public,
        private,
        radv,
    })
}

fn build_radv(cfg: &RadvSection) -> Radv {
    let (min_interval, max_interval) = match cfg.adv_interval.as_slice() {
        [min, max, ..] => (*min, *max),
        _ => (30, 60),
    };
    Radv {
        enabled: cfg.enabled,
        min_interval,
        max_interval,
        default_lifetime: if cfg.lifetime > 0 { cfg.lifetime } else { 180 },
        dhcp: cfg.dhcp,
        prefixes: cfg
            .prefixes
            .iter()
            .map(|p| {
                let (valid, preferred) = match p.lifetime.as_slice() {
                    [valid, preferred, ..] => (*valid, *preferred),
                    _ => (1800, 900),
                };
                RadvPrefix {
                    prefix: p.prefix.clone(),
                    on_link: p.on_link,
                    autonomous: p.auto,
                    router_addr: p.adv_addr,
                    valid_lifetime: valid,
                    preferred_lifetime: preferred,
                }
            })
            .collect(),
        routes: cfg
            .routes
            .iter()
            .filter_map(|entry| {
                if entry.route.len() < 2 {
                    return None;
                }
                let prefix = entry.route[0].as_str().unwrap_or_default().to_string();
                if prefix.is_empty() {
                    return None;
                }
                Some(RadvRoute {
                    prefix,
                    preference: entry.route[1].as_str().unwrap_or("medium").to_string(),
                    lifetime: entry
                        .route
                        .get(2)
                        .and_then(serde_yaml::Value::as_i64)
                        .unwrap_or(3600),
                    metric: entry
                        .route
                        .get(3)
                        .and_then(serde_yaml::Value::as_i64)
                        .unwrap_or(0),
                })
            })
            .collect(),
        rdnss: cfg
            .rdnss
            .iter()
            .map(|r| Rdnss {
                servers: r.server.clone(),
                lifetime: if r.lifetime > 0 { r.lifetime } else { 300 },
            })
            .collect(),
        include: cfg.include.clone(),
    }
}

impl MappingSet {
    /// Routes to advertise for annotated pairs whose expanded public address
    /// is structurally usable.
    pub fn advertised_routes(&self) -> Vec<RadvRoute> {
        if !self.enabled {
            return Vec::new();
        }
        self.pairs
            .iter()
            .filter_map(|pair| {
                let annotation = pair.radv.as_ref()?;
                let public = addr::expand(&pair.public, &self.pfx_pub);
                if !addr::is_structurally_valid(&public) {
                    return None;
                }
                Some(RadvRoute {
                    prefix: public,
                    preference: annotation.preference.clone(),
                    lifetime: annotation.lifetime,
                    metric: 0,
                })
            })
            .collect()
    }
}

impl Link {
    /// All mapping-derived advertised routes for this link.
    pub fn advertised_routes(&self) -> Vec<RadvRoute> {
        self.mapping_sets
            .iter()
            .flat_map(MappingSet::advertised_routes)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config(doc: &str) -> Config {
        serde_yaml::from_str(doc).expect("parse")
    }

    #[test]
    fn links_come_back_name_sorted() {
        let cfg = config("network:\n  links:\n    wan0: {}\n    lan0: {}\n    dmz0: {}\n");
        let names: Vec<String> = build_links(&cfg).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["dmz0", "lan0", "wan0"]);
    }

    #[test]
    fn four_element_pairs_carry_an_annotation() {
        let cfg = config(
            r#"
network:
  links:
    pub1:
      netmap6:
        c1:
          enabled: true
          maps:
            - pair: ["a::1", "b::1", "low", 600]
            - pair: ["a::2", "b::2"]
            - pair: ["lonely"]
"#,
        );
        let links = build_links(&cfg);
        let set = &links[0].mapping_sets[0];
        assert_eq!(set.pairs.len(), 2);
        assert_eq!(
            set.pairs[0].radv,
            Some(RadvAnnotation {
                preference: "low".to_string(),
                lifetime: 600,
            })
        );
        assert_eq!(set.pairs[1].radv, None);
    }

    #[test]
    fn radv_defaults_fill_missing_values() {
        let cfg = config(
            "network:\n  links:\n    pub1:\n      radv:\n        enabled: true\n",
        );
        let links = build_links(&cfg);
        let radv = links[0].radv.as_ref().expect("radv");
        assert_eq!(radv.min_interval, 30);
        assert_eq!(radv.max_interval, 60);
        assert_eq!(radv.default_lifetime, 180);
    }

    #[test]
    fn advertised_routes_expand_and_filter_public_addresses() {
        let cfg = config(
            r#"
network:
  links:
    pub1:
      netmap6:
        c1:
          enabled: true
          pfx-pub: "2001:db8:1::"
          maps:
            - pair: ["20:0:0/96", "fd00::20/96", "high", 3600]
            - pair: ["bogus/96", "fd00::21/96", "high", 3600]
            - pair: ["21:0:0/96", "fd00::22/96"]
"#,
        );
        let links = build_links(&cfg);
        let routes = links[0].advertised_routes();
        // The unannotated pair contributes nothing; the malformed public
        // address is filtered out.
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].prefix, "2001:db8:1:20:0:0/96");
        assert_eq!(routes[0].preference, "high");
        assert_eq!(routes[0].lifetime, 3600);
    }
}
