use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use netmap_sync::config::parse_config;
use netmap_sync::link::build_links;
use netmap_sync::report::render_rule_listing;
use netmap_sync::validate::{build_validate_report, render_validate_text};
use netmap_sync::{compile, radvd, scan};

mod apply_cmd;
mod capture_cmd;
mod cli;

use cli::{Cli, Command, CompileArgs, OutputFormat, ShowArgs, ShowTarget, ValidateArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.debug);

    match cli.command {
        Command::Apply(args) => apply_cmd::run_apply(&cli.config, args),
        Command::Compile(args) => run_compile(&cli.config, args),
        Command::Capture(args) => capture_cmd::run_capture(args),
        Command::Status => run_status(&cli.config),
        Command::Validate(args) => run_validate(&cli.config, args),
        Command::Show(args) => run_show(args),
    }
}

fn init_logging(quiet: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run_compile(config_path: &Path, args: CompileArgs) -> Result<()> {
    let config = parse_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let links = build_links(&config);

    if args.radvd {
        print!("{}", radvd::render_radvd_conf(&links));
        return Ok(());
    }

    let mut desired = compile::desired_nat4_rules(&links);
    desired.extend(compile::desired_nat6_rules(&links));
    desired.extend(compile::desired_netmap_rules(&links));

    match args.format {
        OutputFormat::Text => {
            for rule in desired.iter() {
                println!("{}", rule.raw);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&desired)?),
    }
    Ok(())
}

fn run_validate(config_path: &Path, args: ValidateArgs) -> Result<()> {
    let config = parse_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let report = build_validate_report(&config);

    match args.format {
        OutputFormat::Text => println!("{}", render_validate_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !report.errors.is_empty() {
        bail!("validation failed: {} errors", report.errors.len());
    }
    if args.strict && !report.warnings.is_empty() {
        bail!(
            "validation failed in strict mode: {} warnings",
            report.warnings.len()
        );
    }
    Ok(())
}

fn run_status(config_path: &Path) -> Result<()> {
    match parse_config(config_path) {
        Ok(config) => {
            println!(
                "config: {} ({} links)",
                config_path.display(),
                config.network.links.len()
            );
            for link in build_links(&config) {
                println!(
                    "- {}: mapping_sets={} nat44={} nat66={} radv={}",
                    link.name,
                    link.mapping_sets.iter().filter(|m| m.enabled).count(),
                    link.nat44.as_ref().is_some_and(|n| n.enabled),
                    link.nat66.as_ref().is_some_and(|n| n.enabled),
                    link.radv.as_ref().is_some_and(|r| r.enabled),
                );
            }
        }
        Err(err) => println!("config: {} (unreadable: {err})", config_path.display()),
    }

    match scan::netmap_rules() {
        Ok(rules) => println!("netmap6: {} live rules", rules.len()),
        Err(err) => println!("netmap6: scan failed ({err})"),
    }
    for (family, tool) in [("nat44", scan::IPTABLES_CMD), ("nat66", scan::IP6TABLES_CMD)] {
        match scan::nat_rules(tool) {
            Ok(rules) => println!("{family}: {} live rules", rules.len()),
            Err(err) => println!("{family}: scan failed ({err})"),
        }
    }
    match scan::radvd_active() {
        Ok(true) => println!("radvd: {}", "active".green()),
        Ok(false) => println!("radvd: {}", "inactive".red()),
        Err(err) => println!("radvd: status unknown ({err})"),
    }
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    match args.what {
        ShowTarget::Netmap => {
            let rules = scan::netmap_rules().context("failed to scan NETMAP rules")?;
            let raws: Vec<&str> = rules.iter().map(|r| r.raw.as_str()).collect();
            println!("{}", render_rule_listing(&raws));
        }
        ShowTarget::Nat => {
            for (family, tool) in [("IPv4", scan::IPTABLES_CMD), ("IPv6", scan::IP6TABLES_CMD)] {
                println!("{} rules:", family.bold());
                match scan::nat_rules(tool) {
                    Ok(rules) => {
                        let raws: Vec<&str> = rules.iter().map(|r| r.raw.as_str()).collect();
                        println!("{}", render_rule_listing(&raws));
                    }
                    Err(err) => println!("scan failed: {err}"),
                }
            }
        }
        ShowTarget::Radvd => {
            match scan::radvd_active() {
                Ok(true) => println!("radvd: {}", "active".green()),
                Ok(false) => println!("radvd: {}", "inactive".red()),
                Err(err) => println!("radvd: status unknown ({err})"),
            }
            let interfaces = radvd::load_radvd_conf(Path::new(radvd::RADVD_CONF_PATH))
                .context("failed to read advertisement config")?;
            if interfaces.is_empty() {
                println!("no advertisement interfaces configured");
            }
            for (name, iface) in interfaces {
                println!(
                    "interface {name}: interval {}-{}s lifetime {}s dhcp={}",
                    iface.min_interval, iface.max_interval, iface.default_lifetime,
                    iface.managed_flag,
                );
                for prefix in &iface.prefixes {
                    println!(
                        "  prefix {} on-link={} autonomous={}",
                        prefix.prefix, prefix.on_link, prefix.autonomous
                    );
                }
                for route in &iface.routes {
                    println!(
                        "  route {} preference={} lifetime={}s",
                        route.prefix, route.preference, route.lifetime
                    );
                }
            }
        }
    }
    Ok(())
}
