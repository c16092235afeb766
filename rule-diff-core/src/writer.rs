use crate::rule::{Direction, Rule};

/// Render a rule as an append command with flags in a fixed order.
///
/// This is what the list-format parser uses to rebuild raw text, and what
/// compilers use to mint desired rules, so both sides of a diff carry
/// executable command text.
pub fn append_command(tool: &str, table: &str, rule: &Rule) -> String {
    let mut cmd = format!("{tool} -t {table} -A {}", rule.chain);
    if let Some(protocol) = &rule.protocol {
        cmd.push_str(&format!(" -p {protocol}"));
    }
    if let Some(interface) = &rule.interface {
        match rule.direction {
            Direction::Inbound => cmd.push_str(&format!(" -i {interface}")),
            Direction::Outbound => cmd.push_str(&format!(" -o {interface}")),
            Direction::Unspecified => {}
        }
    }
    if let Some(source) = &rule.source {
        cmd.push_str(&format!(" -s {source}"));
    }
    if let Some(destination) = &rule.destination {
        cmd.push_str(&format!(" -d {destination}"));
    }
    cmd.push_str(&format!(" -j {}", rule.target));
    if let Some(arg) = &rule.target_arg {
        if rule.target.eq_ignore_ascii_case("TCPMSS") {
            cmd.push_str(&format!(" --set-mss {arg}"));
        } else {
            cmd.push_str(&format!(" --to {arg}"));
        }
    }
    cmd
}

/// Rewrite the append verb of a raw rule command into the delete verb.
pub fn delete_command(raw: &str) -> String {
    raw.replacen(" -A ", " -D ", 1)
}
