use std::time::Duration;

use anyhow::Result;
use clap::{arg, crate_name, crate_version, ArgAction, ArgGroup, ArgMatches, Command};
use pad::PadStr;
use portscout::{
    error::ScanError,
    logger, netinfo,
    scan::{PortSpec, ScanReport, Scanner},
    services,
};

struct ParsedArgs {
    debug: bool,
    spec: PortSpec,
    concurrency: Option<usize>,
    timeout: Option<Duration>,
    target: String,
}

fn parse_range(raw: &str) -> Result<PortSpec, ScanError> {
    let invalid = || ScanError::InvalidPort(String::from(raw));

    let (start, end) = raw.split_once('-').ok_or_else(invalid)?;
    let start = start.trim().parse::<u16>().map_err(|_| invalid())?;
    let end = end.trim().parse::<u16>().map_err(|_| invalid())?;

    PortSpec::range(start, end)
}

fn parse_args(matches: ArgMatches) -> Result<ParsedArgs, ScanError> {
    let debug = matches.get_flag("debug");

    let spec = if let Some(rps) = matches.get_many::<String>("port") {
        PortSpec::selected(
            rps.map(|rp| {
                rp.parse::<u16>()
                    .map_err(|_| ScanError::InvalidPort(String::from(rp)))
            })
            .collect::<Result<_, _>>()?,
        )?
    } else if let Some(raw) = matches.get_one::<String>("range") {
        parse_range(raw)?
    } else {
        // No selection falls back to the well-known ports.
        PortSpec::selected(services::known_ports())?
    };

    let concurrency = matches.get_one::<usize>("concurrency").copied();

    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|&ms| Duration::from_millis(ms));

    let target = matches.get_one::<String>("target").unwrap().to_owned();

    Ok(ParsedArgs {
        debug,
        spec,
        concurrency,
        timeout,
        target,
    })
}

fn print_netinfo() {
    let local_ip = netinfo::local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| String::from("unavailable"));
    let hostname = netinfo::hostname().unwrap_or_else(|| String::from("unavailable"));

    println!("Local IP: {}", local_ip);
    println!("Hostname: {}\n", hostname);
}

fn print_report(report: ScanReport) {
    let mut out = format!("Scan Duration: {:.4}s\n\n", report.elapsed.as_secs_f32());

    if report.open_count == 0 {
        out.push_str("Didn't find any open port.\n");
    } else {
        out.push_str("Port    Status     Service\n");

        report.open_ports().for_each(|pr| {
            out.push_str(&format!(
                "{:<8}{}{}\n",
                pr.port,
                format!("{}", pr.status).pad_to_width(11),
                pr.service.unwrap_or(services::UNKNOWN_SERVICE),
            ))
        });
    }

    out.push_str(&format!(
        "\nScanned {} ports on {}: {} open, {} closed, {} errors.\n",
        report.total(),
        report.target,
        report.open_count,
        report.closed_count,
        report.error_count,
    ));

    if !report.complete {
        out.push_str("Scan was interrupted before every port was probed.\n");
    }

    print!("{}", out);
}

fn main() -> Result<()> {
    let arg_matches = Command::new(crate_name!())
        .about(
            "TCP connect port scanner.\n\
            Probes an explicit port set, a contiguous range, or the\n\
            well-known ports when no selection is given.",
        )
        .version(crate_version!())
        .arg_required_else_help(true)
        .args([
            // Miscellaneous arguments.
            arg!(-d --debug "Turns on debugging information").action(ArgAction::SetTrue),
            arg!([target] "Address or hostname to scan").required(true),
        ])
        .args([
            // Port selection.
            arg!(-p --port <PORT> "One or more ports separated by a comma").value_delimiter(','),
            arg!(-r --range <RANGE> "Inclusive port range, e.g. 1-1024"),
        ])
        .group(ArgGroup::new("selection").args(["port", "range"]))
        .args([
            // Scan tuning.
            arg!(-c --concurrency <N> "Maximum simultaneous probes")
                .value_parser(clap::value_parser!(usize)),
            arg!(-T --timeout <MS> "Per-probe timeout in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        ])
        .get_matches();

    // Extract arguments.
    let parsed = parse_args(arg_matches)?;

    // Set debug if desired.
    if parsed.debug {
        logger::init();
    }

    // Show where we're scanning from.
    print_netinfo();

    // Build the scanner with any overrides.
    let mut scanner = Scanner::new(parsed.target, parsed.spec);
    if let Some(concurrency) = parsed.concurrency {
        scanner = scanner.with_concurrency(concurrency);
    }
    if let Some(timeout) = parsed.timeout {
        scanner = scanner.with_timeout(timeout)?;
    }

    // Start scanner.
    let report = scanner.start()?;

    // Show result.
    print_report(report);

    Ok(())
}
