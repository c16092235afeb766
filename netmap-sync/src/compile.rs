//! Compilation of the link model into desired rule sets.

use log::warn;
use rule_diff_core::{addr, append_command, Direction, Rule, RuleSet};

use crate::config::NatConfig;
use crate::link::{Link, MappingSet};
use crate::scan::{IP6TABLES_CMD, IPTABLES_CMD};

/// Desired NETMAP rules across all links.
pub fn desired_netmap_rules(links: &[Link]) -> RuleSet {
    let mut set = RuleSet::new();
    for link in links {
        for mapping in &link.mapping_sets {
            set.extend(mapping_set_rules(&link.name, mapping));
        }
    }
    set
}

/// Desired IPv4 NAT rules across all links.
pub fn desired_nat4_rules(links: &[Link]) -> RuleSet {
    let mut set = RuleSet::new();
    for link in links {
        if let Some(nat) = &link.nat44 {
            set.extend(nat_rules(IPTABLES_CMD, &link.name, nat));
        }
    }
    set
}

/// Desired IPv6 NAT rules across all links.
pub fn desired_nat6_rules(links: &[Link]) -> RuleSet {
    let mut set = RuleSet::new();
    for link in links {
        if let Some(nat) = &link.nat66 {
            set.extend(nat_rules(IP6TABLES_CMD, &link.name, nat));
        }
    }
    set
}

/// Two rules per usable pair: an outbound rule translating private to
/// public on egress, and an inbound rule translating public back to private
/// on ingress.
fn mapping_set_rules(ifname: &str, mapping: &MappingSet) -> RuleSet {
    let mut set = RuleSet::new();
    if !mapping.enabled || ifname.is_empty() {
        return set;
    }
    for pair in &mapping.pairs {
        if pair.public.is_empty() || pair.private.is_empty() {
            warn!(
                "mapping set {}.{}: skipping pair with a missing address",
                ifname, mapping.name
            );
            continue;
        }
        let public = addr::expand(&pair.public, &mapping.pfx_pub);
        let private = addr::expand(&pair.private, &mapping.pfx_priv);
        if !addr::is_structurally_valid(&public) || !addr::is_structurally_valid(&private) {
            warn!(
                "mapping set {}.{}: skipping pair {} <-> {}: expanded address is not usable",
                ifname, mapping.name, pair.public, pair.private
            );
            continue;
        }
        set.push(netmap_rule(ifname, Direction::Outbound, &private, &public));
        set.push(netmap_rule(ifname, Direction::Inbound, &public, &private));
    }
    set
}

fn netmap_rule(ifname: &str, direction: Direction, matched: &str, translated: &str) -> Rule {
    let (chain, source, destination) = match direction {
        Direction::Outbound => ("POSTROUTING", Some(matched.to_string()), None),
        _ => ("PREROUTING", None, Some(matched.to_string())),
    };
    let mut rule = Rule {
        chain: chain.to_string(),
        direction,
        interface: Some(ifname.to_string()),
        protocol: None,
        source,
        destination,
        target: "NETMAP".to_string(),
        target_arg: Some(translated.to_string()),
        raw: String::new(),
    };
    rule.raw = append_command(IP6TABLES_CMD, "nat", &rule);
    rule
}

/// Masquerade plus optional clamp and origin-scoped masquerade rules for one
/// NAT config.
fn nat_rules(tool: &str, ifname: &str, nat: &NatConfig) -> RuleSet {
    let mut set = RuleSet::new();
    if !nat.enabled || ifname.is_empty() {
        return set;
    }
    set.push(masquerade_rule(tool, ifname, None));
    if nat.mss_clamping && nat.mss > 0 {
        set.push(clamp_rule(tool, ifname, nat.mss));
    }
    for origin in &nat.origins {
        if !origin.is_empty() {
            set.push(masquerade_rule(tool, ifname, Some(origin)));
        }
    }
    set
}

fn masquerade_rule(tool: &str, ifname: &str, origin: Option<&str>) -> Rule {
    let mut rule = Rule {
        chain: "POSTROUTING".to_string(),
        direction: Direction::Outbound,
        interface: Some(ifname.to_string()),
        protocol: None,
        source: origin.map(str::to_string),
        destination: None,
        target: "MASQUERADE".to_string(),
        target_arg: None,
        raw: String::new(),
    };
    rule.raw = append_command(tool, "nat", &rule);
    rule
}

fn clamp_rule(tool: &str, ifname: &str, mss: i64) -> Rule {
    Rule {
        chain: "FORWARD".to_string(),
        direction: Direction::Outbound,
        interface: Some(ifname.to_string()),
        protocol: Some("tcp".to_string()),
        source: None,
        destination: None,
        target: "TCPMSS".to_string(),
        target_arg: Some(mss.to_string()),
        raw: format!(
            "{tool} -t mangle -A FORWARD -o {ifname} -p tcp --tcp-flags SYN,RST SYN -j TCPMSS --set-mss {mss}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;
    use crate::link::build_links;

    fn links(doc: &str) -> Vec<Link> {
        let config: Config = serde_yaml::from_str(doc).expect("parse");
        build_links(&config)
    }

    #[test]
    fn enabled_pairs_emit_outbound_and_inbound_rules() {
        let links = links(
            r#"
network:
  links:
    pub1:
      netmap6:
        c1:
          enabled: true
          pfx-pub: "2001:db8:1::"
          pfx-priv: "fd5a:1::"
          maps:
            - pair: ["20:0:0/96", "20:0:0/96"]
"#,
        );
        let rules = desired_netmap_rules(&links);
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules.rules[0].raw,
            "ip6tables -t nat -A POSTROUTING -o pub1 -s fd5a:1:20:0:0/96 -j NETMAP --to 2001:db8:1:20:0:0/96"
        );
        assert_eq!(
            rules.rules[1].raw,
            "ip6tables -t nat -A PREROUTING -i pub1 -d 2001:db8:1:20:0:0/96 -j NETMAP --to fd5a:1:20:0:0/96"
        );
    }

    #[test]
    fn disabled_sets_and_unusable_pairs_emit_nothing() {
        let links = links(
            r#"
network:
  links:
    pub1:
      netmap6:
        off:
          enabled: false
          maps:
            - pair: ["a::1", "b::1"]
        partial:
          enabled: true
          maps:
            - pair: ["a::1", ""]
            - pair: ["", "b::1"]
        broken:
          enabled: true
          pfx-pub: "2001:db8:1::"
          maps:
            - pair: ["20:0:0:0:0:0:0:0", "fd00::1"]
"#,
        );
        // The last pair expands to nine segments and is dropped.
        assert!(desired_netmap_rules(&links).is_empty());
    }

    #[test]
    fn nat_config_emits_masquerade_clamp_and_origin_rules() {
        let links = links(
            r#"
network:
  links:
    pub1:
      nat66:
        enabled: true
        mss-clamping: true
        mss: 1440
        origins: ["fd5a:1::/48", ""]
      nat44:
        enabled: true
        mss-clamping: false
        mss: 1440
        origins: []
"#,
        );
        let nat6 = desired_nat6_rules(&links);
        let raws: Vec<&str> = nat6.iter().map(|r| r.raw.as_str()).collect();
        assert_eq!(
            raws,
            vec![
                "ip6tables -t nat -A POSTROUTING -o pub1 -j MASQUERADE",
                "ip6tables -t mangle -A FORWARD -o pub1 -p tcp --tcp-flags SYN,RST SYN -j TCPMSS --set-mss 1440",
                "ip6tables -t nat -A POSTROUTING -o pub1 -s fd5a:1::/48 -j MASQUERADE",
            ]
        );

        let nat4 = desired_nat4_rules(&links);
        assert_eq!(nat4.len(), 1);
        assert_eq!(
            nat4.rules[0].raw,
            "iptables -t nat -A POSTROUTING -o pub1 -j MASQUERADE"
        );
    }

    #[test]
    fn disabled_nat_emits_nothing() {
        let links = links(
            "network:\n  links:\n    pub1:\n      nat66:\n        enabled: false\n",
        );
        assert!(desired_nat6_rules(&links).is_empty());
    }
}
