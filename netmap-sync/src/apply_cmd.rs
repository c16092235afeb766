use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use netmap_sync::config::parse_config;
use netmap_sync::executor::apply_plan;
use netmap_sync::link::{build_links, Link};
use netmap_sync::report::render_plan;
use netmap_sync::{compile, radvd, scan};
use rule_diff_core::{reconcile, RuleSet};

use crate::cli::ApplyArgs;

pub fn run_apply(config_path: &Path, args: ApplyArgs) -> Result<()> {
    let config = parse_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if config.network.links.is_empty() {
        bail!("no links configured in {}", config_path.display());
    }
    let links = build_links(&config);
    let timeout = Duration::from_secs(args.timeout);

    let mut failed = 0;
    let mut attempted = 0;

    let observed = scan::nat_rules(scan::IPTABLES_CMD).context("failed to scan IPv4 NAT rules")?;
    let (f, a) = sync_family(
        "nat44",
        compile::desired_nat4_rules(&links),
        observed,
        &args,
        timeout,
    );
    failed += f;
    attempted += a;

    let observed = scan::nat_rules(scan::IP6TABLES_CMD).context("failed to scan IPv6 NAT rules")?;
    let (f, a) = sync_family(
        "nat66",
        compile::desired_nat6_rules(&links),
        observed,
        &args,
        timeout,
    );
    failed += f;
    attempted += a;

    let observed = scan::netmap_rules().context("failed to scan NETMAP rules")?;
    let (f, a) = sync_family(
        "netmap6",
        compile::desired_netmap_rules(&links),
        observed,
        &args,
        timeout,
    );
    failed += f;
    attempted += a;

    sync_radvd(&links, args.dry_run)?;

    if failed > 0 {
        bail!("failed to add {failed} of {attempted} rules");
    }
    if !args.dry_run {
        info!("all configurations applied");
    }
    Ok(())
}

/// Reconcile one rule family. Returns the addition failure count and the
/// number of additions attempted.
fn sync_family(
    family: &str,
    desired: RuleSet,
    observed: RuleSet,
    args: &ApplyArgs,
    timeout: Duration,
) -> (usize, usize) {
    let plan = reconcile(&desired, &observed);

    if args.dry_run {
        println!("{}", render_plan(family, &plan, args.verbose));
        return (0, 0);
    }
    if plan.is_noop() {
        info!(
            "{family}: already in sync ({} rules satisfied)",
            plan.satisfied.len()
        );
        return (0, 0);
    }

    let report = apply_plan(&plan, timeout);
    info!(
        "{family}: removed {} of {} stale rules, added {} of {}",
        report.removed,
        plan.to_remove.len(),
        report.added,
        report.attempted_adds
    );
    for (rule, err) in &report.add_failures {
        warn!("{family}: failed to add {rule}: {err}");
    }
    (report.add_failures.len(), report.attempted_adds)
}

fn sync_radvd(links: &[Link], dry_run: bool) -> Result<()> {
    let content = radvd::render_radvd_conf(links);
    if dry_run {
        print!("{content}");
        return Ok(());
    }
    if content.is_empty() {
        // No link advertises anything; leave the system file alone.
        info!("no advertisement config to render");
        return Ok(());
    }
    let changed = radvd::write_if_changed(Path::new(radvd::RADVD_CONF_PATH), &content)
        .context("failed to update advertisement config")?;
    if changed {
        info!("advertisement config updated");
        if let Err(err) = scan::restart_radvd() {
            warn!("failed to restart radvd: {err}");
        }
    } else {
        info!("advertisement config unchanged");
    }
    Ok(())
}
