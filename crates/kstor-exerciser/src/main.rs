//! kstor-exerciser: concurrent load client for the kstor chunk server.

use anyhow::{Context, Result};

use kstor_client::Exerciser;
use kstor_core::config::ExerciserConfig;

fn print_usage() {
    println!("Usage: kstor-exerciser [host:port] [options]");
    println!();
    println!("Options:");
    println!("  --sessions <n>   Concurrent sessions (default: 1000)");
    println!("  --rounds <n>     Rounds per session (default: 10)");
    println!("  --checksum       Use the checksummed frame header");
    println!("  --json           Print the run report as JSON");
    println!();
    println!("Settings are also read from $KSTOR_CONFIG or");
    println!("~/.config/kstor/exerciser.toml, and KSTOR_* env vars.");
}

struct Args {
    json: bool,
}

/// Apply command-line overrides on top of the loaded config.
fn parse_args(config: &mut ExerciserConfig, args: &[String]) -> Result<Option<Args>> {
    let mut parsed = Args { json: false };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--sessions" => {
                i += 1;
                config.load.sessions = args
                    .get(i)
                    .context("--sessions requires a value")?
                    .parse()
                    .context("--sessions must be a number")?;
            }
            "--rounds" => {
                i += 1;
                config.load.rounds = args
                    .get(i)
                    .context("--rounds requires a value")?
                    .parse()
                    .context("--rounds must be a number")?;
            }
            "--checksum" => config.protocol.checksum = true,
            "--json" => parsed.json = true,
            "help" | "--help" | "-h" => return Ok(None),
            endpoint if !endpoint.starts_with('-') => {
                let (host, port) = endpoint
                    .rsplit_once(':')
                    .with_context(|| format!("expected host:port, got {endpoint}"))?;
                config.server.host = host.to_string();
                config.server.port = port
                    .parse()
                    .with_context(|| format!("invalid port in {endpoint}"))?;
            }
            other => anyhow::bail!("unknown option: {other}"),
        }
        i += 1;
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = ExerciserConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ExerciserConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&mut config, &args)? else {
        print_usage();
        return Ok(());
    };
    config.validate()?;

    tracing::info!(
        server = %config.server.addr(),
        sessions = config.load.sessions,
        rounds = config.load.rounds,
        checksum = config.protocol.checksum,
        "kstor-exerciser starting"
    );

    let exerciser = Exerciser::new(config);
    let report = exerciser
        .run()
        .await
        .context("failed to establish sessions")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} sessions failed ({} of {} cycles completed)",
            report.failed_sessions,
            report.sessions,
            report.completed_cycles,
            report.expected_cycles()
        );
    }

    Ok(())
}
