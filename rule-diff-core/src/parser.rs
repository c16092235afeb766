use crate::rule::{Direction, Rule, RuleSet};
use crate::writer::append_command;

/// Parse `-S` (save-format) listing output into rules.
///
/// Only `-A <chain> ...` lines are considered; anything else (policy lines,
/// chain declarations) is skipped. `tool` and `table` are prepended to each
/// line to form the raw command text, so the rule can be re-applied or
/// deleted exactly as listed.
pub fn parse_save_output(tool: &str, table: &str, output: &str) -> RuleSet {
    let mut set = RuleSet::new();
    for line in output.lines() {
        let line = line.trim();
        if !line.starts_with("-A ") {
            continue;
        }
        if let Some(rule) = parse_save_line(tool, table, line) {
            set.push(rule);
        }
    }
    set
}

fn parse_save_line(tool: &str, table: &str, line: &str) -> Option<Rule> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let chain = parts[1].to_string();

    let mut direction = Direction::Unspecified;
    let mut interface = None;
    let mut protocol = None;
    let mut source = None;
    let mut destination = None;
    let mut target = None;
    let mut target_arg = None;

    let mut i = 2;
    while i < parts.len() {
        let value = parts.get(i + 1).copied();
        match parts[i] {
            "-i" => {
                interface = value.map(str::to_string);
                direction = Direction::Inbound;
                i += 1;
            }
            "-o" => {
                interface = value.map(str::to_string);
                direction = Direction::Outbound;
                i += 1;
            }
            "-p" => {
                protocol = value.and_then(normal_token);
                i += 1;
            }
            "-s" => {
                source = value.and_then(normal_token);
                i += 1;
            }
            "-d" => {
                destination = value.and_then(normal_token);
                i += 1;
            }
            "-j" => {
                target = value.map(str::to_string);
                i += 1;
            }
            "--to" | "--to-source" | "--to-destination" | "--set-mss" => {
                target_arg = value.map(str::to_string);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    Some(Rule {
        chain,
        direction,
        interface,
        protocol,
        source,
        destination,
        target: target?,
        target_arg,
        raw: format!("{tool} -t {table} {line}"),
    })
}

/// Parse `-L -n -v` (human-table) listing output into rules.
///
/// Chain membership comes from the nearest preceding `Chain <name>` header.
/// Columns are `pkts bytes target prot opt in out source destination
/// [extras]`. The raw command text is rebuilt in append form with a fixed
/// flag order, so a rule listed this way compares and deletes the same as
/// one listed in save format.
pub fn parse_list_output(tool: &str, table: &str, output: &str) -> RuleSet {
    let mut set = RuleSet::new();
    let mut chain: Option<String> = None;
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("Chain ") {
            chain = rest.split_whitespace().next().map(str::to_string);
            continue;
        }
        if line.starts_with("pkts") {
            continue;
        }
        let Some(chain) = chain.as_deref() else {
            continue;
        };
        if let Some(rule) = parse_list_line(tool, table, chain, line) {
            set.push(rule);
        }
    }
    set
}

fn parse_list_line(tool: &str, table: &str, chain: &str, line: &str) -> Option<Rule> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }
    // Rule lines always lead with the packet counter.
    if !fields[0].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let target = fields[2].to_string();
    let protocol = normal_token(fields[3]);
    let in_iface = normal_token(fields[5]);
    let out_iface = normal_token(fields[6]);
    let source = normal_token(fields[7]);
    let destination = normal_token(fields[8]);

    // An incoming chain matches on the ingress interface, an outgoing chain
    // on the egress one.
    let (direction, interface) = if incoming_chain(chain) {
        (Direction::Inbound, in_iface)
    } else if outgoing_chain(chain) {
        (Direction::Outbound, out_iface)
    } else if out_iface.is_some() {
        (Direction::Outbound, out_iface)
    } else if in_iface.is_some() {
        (Direction::Inbound, in_iface)
    } else {
        (Direction::Unspecified, None)
    };

    let mut target_arg = None;
    for (idx, extra) in fields.iter().enumerate().skip(9) {
        if let Some(value) = extra.strip_prefix("to:") {
            target_arg = Some(value.to_string());
            break;
        }
        if *extra == "set" {
            target_arg = fields.get(idx + 1).map(|v| (*v).to_string());
            break;
        }
    }

    let mut rule = Rule {
        chain: chain.to_string(),
        direction,
        interface,
        protocol,
        source,
        destination,
        target,
        target_arg,
        raw: String::new(),
    };
    rule.raw = append_command(tool, table, &rule);
    Some(rule)
}

fn incoming_chain(chain: &str) -> bool {
    let chain = chain.to_ascii_uppercase();
    chain.contains("PREROUTING") || chain.contains("INPUT")
}

fn outgoing_chain(chain: &str) -> bool {
    let chain = chain.to_ascii_uppercase();
    chain.contains("POSTROUTING") || chain.contains("OUTPUT") || chain.contains("FORWARD")
}

/// Map the listing placeholders for "no value" to `None`.
fn normal_token(token: &str) -> Option<String> {
    match token {
        "" | "any" | "all" | "*" | "--" | "anywhere" | "0.0.0.0/0" | "::/0" => None,
        other => Some(other.to_string()),
    }
}
