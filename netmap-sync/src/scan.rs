//! Live system queries: rule tables, interfaces, routes, and the
//! advertisement daemon.
//!
//! Every query is one blocking external command; parsing is separated from
//! invocation so the parsers can be exercised against canned output.

use std::process::Command;

use log::warn;
use rule_diff_core::{parse_list_output, parse_save_output, RuleSet};
use thiserror::Error;

/// Rule tool for IPv4 tables.
pub const IPTABLES_CMD: &str = "iptables";

/// Rule tool for IPv6 tables.
pub const IP6TABLES_CMD: &str = "ip6tables";

/// Interface and route listing tool.
pub const IP_CMD: &str = "ip";

/// Service manager used to check and restart the advertisement daemon.
pub const SYSTEMCTL_CMD: &str = "systemctl";

/// Errors raised by a live system query.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} exited with status {status}: {output}")]
    Failed {
        command: String,
        status: i32,
        output: String,
    },
}

fn run(program: &str, args: &[&str]) -> Result<String, ScanError> {
    let command = format!("{program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ScanError::Spawn {
            command: command.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(ScanError::Failed {
            command,
            status: output.status.code().unwrap_or(-1),
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Scan one table of one rule tool.
///
/// Prefers the machine-stable save listing; falls back to the human table
/// listing when the save listing fails or yields nothing.
pub fn query_table_rules(tool: &str, table: &str) -> Result<RuleSet, ScanError> {
    if let Ok(output) = run(tool, &["-t", table, "-S"]) {
        let rules = parse_save_output(tool, table, &output);
        if !rules.is_empty() {
            return Ok(rules);
        }
    }
    let output = run(tool, &["-t", table, "-L", "-n", "-v"])?;
    Ok(parse_list_output(tool, table, &output))
}

/// Live NETMAP rules from the IPv6 nat table.
pub fn netmap_rules() -> Result<RuleSet, ScanError> {
    let mut rules = query_table_rules(IP6TABLES_CMD, "nat")?;
    rules.retain_targets(&["NETMAP"]);
    Ok(rules)
}

/// Live translation rules for one family tool: masquerade/SNAT/DNAT from the
/// nat table plus clamp rules from the mangle table. A mangle-table failure
/// only costs the clamp rules.
pub fn nat_rules(tool: &str) -> Result<RuleSet, ScanError> {
    let mut rules = query_table_rules(tool, "nat")?;
    rules.retain_targets(&["MASQUERADE", "SNAT", "DNAT"]);
    match query_table_rules(tool, "mangle") {
        Ok(mut mangle) => {
            mangle.retain_targets(&["TCPMSS"]);
            rules.extend(mangle);
        }
        Err(err) => warn!("mangle table scan failed, skipping clamp rules: {err}"),
    }
    Ok(rules)
}

/// A discovered network interface with its addresses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetInterface {
    pub name: String,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

/// Interfaces that are up and not loopback.
pub fn scan_interfaces() -> Result<Vec<NetInterface>, ScanError> {
    let links = run(IP_CMD, &["-o", "link", "show"])?;
    let addrs = run(IP_CMD, &["-o", "addr", "show"]).unwrap_or_default();
    Ok(parse_interfaces(&links, &addrs))
}

/// Parse `ip -o link show` plus `ip -o addr show` output.
pub fn parse_interfaces(links: &str, addrs: &str) -> Vec<NetInterface> {
    let mut interfaces = Vec::new();
    for line in links.lines() {
        // 2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 ...
        let mut fields = line.split_whitespace();
        let (Some(_index), Some(name), Some(flags)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let name = name.trim_end_matches(':');
        let name = name.split('@').next().unwrap_or(name);
        let flags: Vec<&str> = flags.trim_matches(['<', '>']).split(',').collect();
        if !flags.iter().any(|f| *f == "UP") || flags.iter().any(|f| *f == "LOOPBACK") {
            continue;
        }
        interfaces.push(NetInterface {
            name: name.to_string(),
            ..NetInterface::default()
        });
    }
    for line in addrs.lines() {
        // 2: eth0    inet6 2001:db8::1/64 scope global ...
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let name = fields[1].split('@').next().unwrap_or(fields[1]);
        let Some(iface) = interfaces.iter_mut().find(|i| i.name == name) else {
            continue;
        };
        match fields[2] {
            "inet" => iface.ipv4.push(fields[3].to_string()),
            "inet6" => iface.ipv6.push(fields[3].to_string()),
            _ => {}
        }
    }
    interfaces
}

/// A default-route entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultRoute {
    pub gateway: String,
    pub interface: String,
}

/// Default routes from the main routing table.
pub fn scan_default_routes() -> Result<Vec<DefaultRoute>, ScanError> {
    let output = run(IP_CMD, &["route", "show"])?;
    Ok(parse_default_routes(&output))
}

/// Parse `ip route show` output, keeping only default entries.
pub fn parse_default_routes(output: &str) -> Vec<DefaultRoute> {
    let mut routes = Vec::new();
    for line in output.lines() {
        // default via 192.0.2.254 dev eth0 proto dhcp ...
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() != Some(&"default") || fields.len() < 5 {
            continue;
        }
        routes.push(DefaultRoute {
            gateway: fields[2].to_string(),
            interface: fields[4].to_string(),
        });
    }
    routes
}

/// Whether the advertisement daemon is active.
///
/// `is-active` exits non-zero for every inactive state, so a clean failure
/// means "not active" rather than "unknown".
pub fn radvd_active() -> Result<bool, ScanError> {
    match run(SYSTEMCTL_CMD, &["is-active", "radvd"]) {
        Ok(output) => Ok(output.trim() == "active"),
        Err(ScanError::Failed { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Restart the advertisement daemon so it re-reads its config.
pub fn restart_radvd() -> Result<(), ScanError> {
    run(SYSTEMCTL_CMD, &["restart", "radvd"]).map(|_| ())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{parse_default_routes, parse_interfaces, DefaultRoute};

    const LINKS: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000\\    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
2: pub1: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP mode DEFAULT group default qlen 1000\\    link/ether 52:54:00:12:34:56 brd ff:ff:ff:ff:ff:ff
3: lan0: <BROADCAST,MULTICAST> mtu 1500 qdisc noop state DOWN mode DEFAULT group default qlen 1000\\    link/ether 52:54:00:ab:cd:ef brd ff:ff:ff:ff:ff:ff
4: vlan7@pub1: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP mode DEFAULT group default qlen 1000\\    link/ether 52:54:00:12:34:57 brd ff:ff:ff:ff:ff:ff
";

    const ADDRS: &str = "\
2: pub1    inet 192.0.2.10/24 brd 192.0.2.255 scope global pub1\\       valid_lft forever preferred_lft forever
2: pub1    inet6 2001:db8:1::1/64 scope global\\       valid_lft forever preferred_lft forever
4: vlan7@pub1    inet6 2001:db8:7::1/64 scope global\\       valid_lft forever preferred_lft forever
";

    #[test]
    fn interface_scan_skips_loopback_and_down_links() {
        let interfaces = parse_interfaces(LINKS, ADDRS);
        let names: Vec<&str> = interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["pub1", "vlan7"]);
    }

    #[test]
    fn interface_scan_collects_addresses_per_family() {
        let interfaces = parse_interfaces(LINKS, ADDRS);
        assert_eq!(interfaces[0].ipv4, vec!["192.0.2.10/24"]);
        assert_eq!(interfaces[0].ipv6, vec!["2001:db8:1::1/64"]);
        assert_eq!(interfaces[1].ipv6, vec!["2001:db8:7::1/64"]);
    }

    #[test]
    fn route_scan_keeps_only_default_entries() {
        let output = "\
default via 192.0.2.254 dev pub1 proto dhcp metric 100
192.0.2.0/24 dev pub1 proto kernel scope link src 192.0.2.10
10.9.0.0/16 via 192.0.2.1 dev pub1
";
        assert_eq!(
            parse_default_routes(output),
            vec![DefaultRoute {
                gateway: "192.0.2.254".to_string(),
                interface: "pub1".to_string(),
            }]
        );
    }
}
