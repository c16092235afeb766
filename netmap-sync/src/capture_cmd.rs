use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use netmap_sync::synth::{synthesize, SystemSnapshot};
use netmap_sync::{radvd, scan};
use rule_diff_core::RuleSet;

use crate::cli::CaptureArgs;

pub fn run_capture(args: CaptureArgs) -> Result<()> {
    // Interface and route discovery must work; everything else degrades to
    // an empty scan with a warning.
    let interfaces = scan::scan_interfaces().context("failed to scan network interfaces")?;
    let routes = scan::scan_default_routes().context("failed to scan routes")?;

    let radvd_config = match radvd::load_radvd_conf(Path::new(radvd::RADVD_CONF_PATH)) {
        Ok(map) => map,
        Err(err) => {
            warn!("advertisement config scan failed: {err}");
            BTreeMap::new()
        }
    };
    let netmap_rules = scan::netmap_rules().unwrap_or_else(|err| {
        warn!("NETMAP rule scan failed: {err}");
        RuleSet::new()
    });
    let nat6_rules = scan::nat_rules(scan::IP6TABLES_CMD).unwrap_or_else(|err| {
        warn!("IPv6 NAT rule scan failed: {err}");
        RuleSet::new()
    });

    let snapshot = SystemSnapshot {
        interfaces,
        routes,
        radvd: radvd_config,
        netmap_rules,
        nat6_rules,
    };
    let document = serde_yaml::to_string(&synthesize(&snapshot, args.slim))?;

    match args.output {
        Some(path) => {
            fs::write(&path, &document)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("configuration written to {}", path.display());
        }
        None => print!("{document}"),
    }
    Ok(())
}
