use pretty_assertions::assert_eq;
use rule_diff_core::{format_json, format_summary, format_text, parse_save_output, reconcile};

fn sample_plan() -> rule_diff_core::RulePlan {
    let desired = parse_save_output(
        "ip6tables",
        "nat",
        "-A POSTROUTING -o pub1 -s fd00::20/96 -j NETMAP --to 2001:db8::20/96\n\
         -A POSTROUTING -o pub1 -j MASQUERADE\n",
    );
    let observed = parse_save_output(
        "ip6tables",
        "nat",
        "-A POSTROUTING -o pub1 -j MASQUERADE\n\
         -A POSTROUTING -o pub1 -s fd00::99/96 -j NETMAP --to 2001:db8::99/96\n",
    );
    reconcile(&desired, &observed)
}

#[test]
fn text_format_lists_removals_additions_and_satisfied() {
    let text = format_text(&sample_plan());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("- "));
    assert!(lines[0].contains("fd00::99/96"));
    assert!(lines[1].starts_with("+ "));
    assert!(lines[1].contains("fd00::20/96"));
    assert!(lines[2].starts_with("= "));
    assert!(lines[2].contains("MASQUERADE"));
}

#[test]
fn summary_counts_match_the_plan() {
    assert_eq!(
        format_summary(&sample_plan()),
        "to_add=1 to_remove=1 satisfied=1"
    );
}

#[test]
fn json_format_carries_raw_command_text() {
    let json = format_json(&sample_plan()).expect("serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(
        value["to_add"][0]["raw"].as_str(),
        Some("ip6tables -t nat -A POSTROUTING -o pub1 -s fd00::20/96 -j NETMAP --to 2001:db8::20/96")
    );
    assert_eq!(value["to_remove"].as_array().map(Vec::len), Some(1));
}
