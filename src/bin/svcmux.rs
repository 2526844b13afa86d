use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use svcmux::{Config, DelayedAction, DelayedKind, ServiceCoordinator};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config_path: Option<PathBuf> = None;
    let mut defer = false;
    let mut rest: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => bail!("--config requires a path"),
            },
            "--defer" => defer = true,
            _ => rest.push(arg),
        }
    }

    let Some((command, services)) = rest.split_first() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "detect" => {
            let coordinator = build_coordinator(config_path)?;
            println!("{}", coordinator.init_kind());
            Ok(())
        }
        "status" => {
            require_services(command, services)?;
            let coordinator = build_coordinator(config_path)?;
            for service in services {
                status(&coordinator, service)?;
            }
            Ok(())
        }
        verb @ ("enable" | "disable" | "start" | "stop" | "restart" | "reload" | "remove") => {
            require_services(command, services)?;
            require_root(verb);

            let coordinator = build_coordinator(config_path)?;

            if defer {
                let kind = match verb {
                    "start" => DelayedKind::Start,
                    "reload" => DelayedKind::Reload,
                    "restart" => DelayedKind::Restart,
                    _ => bail!("--defer only applies to start, reload and restart"),
                };
                for service in services {
                    coordinator.register_delayed_action(
                        service,
                        DelayedAction::Lifecycle(kind),
                        0,
                    )?;
                }
                coordinator.drain_delayed_actions()?;
            } else {
                for service in services {
                    dispatch(&coordinator, verb, service)?;
                }
            }

            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn build_coordinator(config_path: Option<PathBuf>) -> Result<ServiceCoordinator> {
    let config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    Ok(ServiceCoordinator::new(config)?)
}

fn dispatch(coordinator: &ServiceCoordinator, verb: &str, service: &str) -> Result<()> {
    match verb {
        "enable" => coordinator.enable(service)?,
        "disable" => coordinator.disable(service)?,
        "start" => coordinator.start(service)?,
        "stop" => coordinator.stop(service)?,
        "restart" => coordinator.restart(service)?,
        "reload" => coordinator.reload(service)?,
        "remove" => coordinator.remove(service)?,
        _ => unreachable!(),
    }
    println!("✓ {} {}", verb, service);
    Ok(())
}

fn status(coordinator: &ServiceCoordinator, service: &str) -> Result<()> {
    if !coordinator.has_service(service)? {
        println!("{}: not installed", service);
        return Ok(());
    }

    let running = coordinator.is_running(service)?;
    let enabled = coordinator.is_enabled(service)?;

    println!(
        "{}: {}, {}",
        service,
        if running { "running" } else { "stopped" },
        if enabled { "enabled" } else { "disabled" }
    );

    Ok(())
}

fn require_services(command: &str, services: &[String]) -> Result<()> {
    if services.is_empty() {
        bail!("{} requires at least one service name", command);
    }
    Ok(())
}

fn require_root(verb: &str) {
    if !nix::unistd::Uid::effective().is_root() {
        eprintln!("Error: svcmux {} must be run as root (use sudo)", verb);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"svcmux - service lifecycle coordination

Usage:
    svcmux detect                     Print the active init system
    svcmux status <service>...        Show running/enabled state
    svcmux start <service>...         Start services
    svcmux stop <service>...          Stop services
    svcmux restart <service>...       Restart services
    svcmux reload <service>...        Reload services
    svcmux enable <service>...        Enable services at boot
    svcmux disable <service>...       Disable services at boot
    svcmux remove <service>...        Remove service definitions

Options:
    --config <path>   Load configuration (root, init flavor, aliases)
    --defer           Queue start/reload/restart requests and coalesce
                      them per service before applying

Examples:
    svcmux detect
    svcmux status postfix dovecot
    svcmux --defer restart postfix postfix   # one restart, not two
    svcmux --config /etc/svcmux.toml reload mta
"#
    );
}
