//! State synthesis: the inverse pipeline.
//!
//! Live scan results are folded back into a configuration document that
//! reproduces the observed state: rules are paired into mappings, shared
//! address prefixes are inferred, advertisement routes are correlated onto
//! mappings, and the result is rendered through the same schema the loader
//! consumes.

use std::collections::{BTreeMap, BTreeSet};

use rule_diff_core::{addr, Direction, Rule, RuleSet};
use serde_yaml::Value;

use crate::config::{
    Config, LinkConfig, MapEntry, MappingSetConfig, NatConfig, NetworkConfig, PrefixEntry,
    RadvSection, RouteEntry,
};
use crate::link::RadvRoute;
use crate::radvd::RadvdInterface;
use crate::scan::{DefaultRoute, NetInterface};

/// Name given to the mapping set reconstructed from live rules.
const CAPTURED_SET_NAME: &str = "c1";

/// Everything the synthesizer consumes, gathered by the capture command.
#[derive(Debug, Default)]
pub struct SystemSnapshot {
    pub interfaces: Vec<NetInterface>,
    pub routes: Vec<DefaultRoute>,
    pub radvd: BTreeMap<String, RadvdInterface>,
    pub netmap_rules: RuleSet,
    pub nat6_rules: RuleSet,
}

/// A reconstructed public/private mapping with optional advertisement
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthPair {
    pub public: String,
    pub private: String,
    pub preference: Option<String>,
    pub lifetime: Option<i64>,
}

/// Group rules by the interface they are bound to; rules naming no
/// interface cannot be attributed and are dropped.
pub fn rules_by_interface(rules: &RuleSet) -> BTreeMap<String, Vec<Rule>> {
    let mut grouped: BTreeMap<String, Vec<Rule>> = BTreeMap::new();
    for rule in rules.iter() {
        if let Some(ifname) = &rule.interface {
            grouped.entry(ifname.clone()).or_default().push(rule.clone());
        }
    }
    grouped
}

/// Reconstruct mapping pairs from one interface's translation rules.
///
/// Outbound rules carry both sides directly (matched source, translated
/// target argument); inbound rules are consulted only when no outbound rule
/// produced a pair.
pub fn derive_pairs(rules: &[Rule]) -> Vec<SynthPair> {
    let mut pairs = Vec::new();
    for rule in rules.iter().filter(|r| r.direction == Direction::Outbound) {
        if let (Some(source), Some(translated)) = (&rule.source, &rule.target_arg) {
            pairs.push(SynthPair {
                public: translated.clone(),
                private: source.clone(),
                preference: None,
                lifetime: None,
            });
        }
    }
    if pairs.is_empty() {
        for rule in rules.iter().filter(|r| r.direction == Direction::Inbound) {
            if let (Some(destination), Some(translated)) = (&rule.destination, &rule.target_arg) {
                pairs.push(SynthPair {
                    public: destination.clone(),
                    private: translated.clone(),
                    preference: None,
                    lifetime: None,
                });
            }
        }
    }
    pairs
}

/// Attach advertisement metadata to each pair by exact prefix-string match,
/// defaulting to high preference and a one-hour lifetime otherwise.
pub fn correlate_routes(pairs: &mut [SynthPair], routes: &[RadvRoute]) {
    for pair in pairs.iter_mut() {
        match routes.iter().find(|r| r.prefix == pair.public) {
            Some(route) => {
                pair.preference = Some(route.preference.clone());
                pair.lifetime = Some(route.lifetime);
            }
            None => {
                pair.preference = Some("high".to_string());
                pair.lifetime = Some(3600);
            }
        }
    }
}

/// Fold a system snapshot into a configuration document.
///
/// In slim mode, interfaces and sections with no enabled, non-empty content
/// are omitted; otherwise every section is emitted with explicit empty
/// markers.
pub fn synthesize(snapshot: &SystemSnapshot, slim: bool) -> Config {
    let netmap_by_iface = rules_by_interface(&snapshot.netmap_rules);
    let nat6_by_iface = rules_by_interface(&snapshot.nat6_rules);

    let mut names: BTreeSet<String> = snapshot.interfaces.iter().map(|i| i.name.clone()).collect();
    names.extend(snapshot.radvd.keys().cloned());
    names.extend(netmap_by_iface.keys().cloned());
    names.extend(nat6_by_iface.keys().cloned());

    let mut links = BTreeMap::new();
    for name in names {
        let has_default_route = snapshot.routes.iter().any(|r| r.interface == name);
        if let Some(link) = synthesize_link(
            snapshot.radvd.get(&name),
            netmap_by_iface.get(&name).map(Vec::as_slice),
            nat6_by_iface.get(&name).map(Vec::as_slice),
            has_default_route,
            slim,
        ) {
            links.insert(name, link);
        }
    }

    Config {
        network: NetworkConfig { links },
    }
}

fn synthesize_link(
    radvd: Option<&RadvdInterface>,
    netmap_rules: Option<&[Rule]>,
    nat6_rules: Option<&[Rule]>,
    has_default_route: bool,
    slim: bool,
) -> Option<LinkConfig> {
    let mut pairs = netmap_rules.map(derive_pairs).unwrap_or_default();
    let radvd_routes: Vec<RadvRoute> = radvd.map(|r| r.routes.clone()).unwrap_or_default();
    correlate_routes(&mut pairs, &radvd_routes);

    let public_addrs: Vec<String> = pairs.iter().map(|p| p.public.clone()).collect();
    let private_addrs: Vec<String> = pairs.iter().map(|p| p.private.clone()).collect();
    let pfx_pub = addr::common_prefix(&public_addrs).unwrap_or_default();
    let pfx_priv = addr::common_prefix(&private_addrs).unwrap_or_default();

    let has_pairs = !pairs.is_empty();
    let nat66_enabled = nat6_rules.is_some_and(|r| !r.is_empty());
    let has_radv = radvd.is_some();
    let has_prefixes = radvd.is_some_and(|r| !r.prefixes.is_empty());

    if slim
        && !has_pairs
        && !nat66_enabled
        && !(has_radv && (has_prefixes || has_default_route))
    {
        return None;
    }

    let mut link = LinkConfig::default();

    if netmap_rules.is_some() && (has_pairs || !slim) {
        let maps = pairs
            .iter()
            .map(|pair| MapEntry {
                pair: vec![
                    Value::String(addr::strip_prefix(&pair.public, &pfx_pub)),
                    Value::String(addr::strip_prefix(&pair.private, &pfx_priv)),
                    Value::String(pair.preference.clone().unwrap_or_else(|| "high".to_string())),
                    Value::Number(pair.lifetime.unwrap_or(3600).into()),
                ],
            })
            .collect();
        link.netmap6.insert(
            CAPTURED_SET_NAME.to_string(),
            MappingSetConfig {
                enabled: has_pairs,
                pfx_pub,
                pfx_priv,
                maps,
            },
        );
    }

    if nat66_enabled || !slim {
        link.nat66 = Some(NatConfig {
            enabled: nat66_enabled,
            mss_clamping: false,
            mss: 1440,
            origins: Vec::new(),
        });
    }
    if !slim {
        link.nat44 = Some(NatConfig {
            enabled: false,
            mss_clamping: false,
            mss: 1440,
            origins: Vec::new(),
        });
    }

    if has_radv || !slim {
        let (min_interval, max_interval, lifetime, dhcp) = radvd
            .map(|r| (r.min_interval, r.max_interval, r.default_lifetime, r.managed_flag))
            .unwrap_or((30, 60, 180, false));
        let prefixes = radvd
            .map(|r| {
                r.prefixes
                    .iter()
                    .map(|p| PrefixEntry {
                        prefix: p.prefix.clone(),
                        on_link: p.on_link,
                        auto: p.autonomous,
                        adv_addr: p.router_addr,
                        lifetime: vec![p.valid_lifetime, p.preferred_lifetime],
                    })
                    .collect()
            })
            .unwrap_or_default();
        let routes = if has_default_route {
            vec![RouteEntry {
                route: vec![
                    Value::String("::/0".to_string()),
                    Value::String("medium".to_string()),
                    Value::Number(3600.into()),
                ],
            }]
        } else {
            Vec::new()
        };
        link.radv = Some(RadvSection {
            enabled: has_radv,
            adv_interval: vec![min_interval, max_interval],
            lifetime,
            dhcp,
            prefixes,
            routes,
            rdnss: Vec::new(),
            include: Vec::new(),
        });
    }

    Some(link)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rule_diff_core::parse_save_output;

    use super::*;

    fn netmap_scan() -> RuleSet {
        parse_save_output(
            "ip6tables",
            "nat",
            "-A POSTROUTING -o pub1 -s fd5a:1:20:0:0/96 -j NETMAP --to 2001:db8:1:20:0:0/96\n\
             -A PREROUTING -i pub1 -d 2001:db8:1:20:0:0/96 -j NETMAP --to fd5a:1:20:0:0/96\n\
             -A POSTROUTING -o pub1 -s fd5a:1:21:0:0/96 -j NETMAP --to 2001:db8:1:21:0:0/96\n\
             -A PREROUTING -i pub1 -d 2001:db8:1:21:0:0/96 -j NETMAP --to fd5a:1:21:0:0/96\n",
        )
    }

    #[test]
    fn outbound_rules_drive_pair_derivation() {
        let grouped = rules_by_interface(&netmap_scan());
        let pairs = derive_pairs(&grouped["pub1"]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].public, "2001:db8:1:20:0:0/96");
        assert_eq!(pairs[0].private, "fd5a:1:20:0:0/96");
    }

    #[test]
    fn inbound_rules_are_the_fallback_pairing() {
        let inbound_only = parse_save_output(
            "ip6tables",
            "nat",
            "-A PREROUTING -i pub1 -d 2001:db8:1:20:0:0/96 -j NETMAP --to fd5a:1:20:0:0/96\n",
        );
        let grouped = rules_by_interface(&inbound_only);
        let pairs = derive_pairs(&grouped["pub1"]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].public, "2001:db8:1:20:0:0/96");
        assert_eq!(pairs[0].private, "fd5a:1:20:0:0/96");
    }

    #[test]
    fn correlation_attaches_route_metadata_or_defaults() {
        let mut pairs = vec![
            SynthPair {
                public: "2001:db8:1:20:0:0/96".to_string(),
                private: "fd5a:1:20:0:0/96".to_string(),
                preference: None,
                lifetime: None,
            },
            SynthPair {
                public: "2001:db8:1:21:0:0/96".to_string(),
                private: "fd5a:1:21:0:0/96".to_string(),
                preference: None,
                lifetime: None,
            },
        ];
        let routes = vec![RadvRoute {
            prefix: "2001:db8:1:20:0:0/96".to_string(),
            preference: "low".to_string(),
            lifetime: 900,
            metric: 0,
        }];

        correlate_routes(&mut pairs, &routes);

        assert_eq!(pairs[0].preference.as_deref(), Some("low"));
        assert_eq!(pairs[0].lifetime, Some(900));
        assert_eq!(pairs[1].preference.as_deref(), Some("high"));
        assert_eq!(pairs[1].lifetime, Some(3600));
    }

    fn snapshot() -> SystemSnapshot {
        SystemSnapshot {
            interfaces: vec![
                NetInterface {
                    name: "pub1".to_string(),
                    ipv4: vec!["192.0.2.10/24".to_string()],
                    ipv6: vec!["2001:db8:1::1/64".to_string()],
                },
                NetInterface {
                    name: "idle0".to_string(),
                    ..NetInterface::default()
                },
            ],
            routes: vec![DefaultRoute {
                gateway: "192.0.2.254".to_string(),
                interface: "pub1".to_string(),
            }],
            radvd: BTreeMap::from([("pub1".to_string(), RadvdInterface::default())]),
            netmap_rules: netmap_scan(),
            nat6_rules: parse_save_output(
                "ip6tables",
                "nat",
                "-A POSTROUTING -o pub1 -j MASQUERADE\n",
            ),
        }
    }

    #[test]
    fn synthesis_infers_prefixes_and_relative_pairs() {
        let config = synthesize(&snapshot(), true);
        let set = &config.network.links["pub1"].netmap6["c1"];

        assert!(set.enabled);
        assert_eq!(set.pfx_pub, "2001:db8:1:");
        assert_eq!(set.pfx_priv, "fd5a:1:");
        assert_eq!(set.maps.len(), 2);
        assert_eq!(set.maps[0].pair[0].as_str(), Some("20:0:0/96"));
        assert_eq!(set.maps[0].pair[1].as_str(), Some("20:0:0/96"));
        assert_eq!(set.maps[0].pair[2].as_str(), Some("high"));
        assert_eq!(set.maps[0].pair[3].as_i64(), Some(3600));
    }

    #[test]
    fn slim_mode_omits_interfaces_without_enabled_content() {
        let config = synthesize(&snapshot(), true);
        assert!(config.network.links.contains_key("pub1"));
        assert!(!config.network.links.contains_key("idle0"));

        let link = &config.network.links["pub1"];
        assert!(link.nat44.is_none());
        assert!(link.nat66.as_ref().is_some_and(|n| n.enabled));
    }

    #[test]
    fn full_mode_emits_disabled_sections_explicitly() {
        let config = synthesize(&snapshot(), false);
        let idle = &config.network.links["idle0"];
        assert!(idle.nat44.as_ref().is_some_and(|n| !n.enabled));
        assert!(idle.nat66.as_ref().is_some_and(|n| !n.enabled));
        assert!(idle.radv.as_ref().is_some_and(|r| !r.enabled));
    }

    #[test]
    fn default_route_becomes_an_advertised_route_entry() {
        let config = synthesize(&snapshot(), true);
        let radv = config.network.links["pub1"].radv.as_ref().expect("radv");
        assert!(radv.enabled);
        assert_eq!(radv.routes.len(), 1);
        assert_eq!(radv.routes[0].route[0].as_str(), Some("::/0"));
    }

    #[test]
    fn synthesized_document_round_trips_through_the_loader() {
        let config = synthesize(&snapshot(), false);
        let rendered = serde_yaml::to_string(&config).expect("render");
        let reparsed: Config = serde_yaml::from_str(&rendered).expect("reparse");

        assert_eq!(
            reparsed.network.links.keys().collect::<Vec<_>>(),
            config.network.links.keys().collect::<Vec<_>>()
        );
        let set = &reparsed.network.links["pub1"].netmap6["c1"];
        assert_eq!(set.pfx_pub, "2001:db8:1:");
        assert_eq!(set.maps.len(), 2);
    }
}
