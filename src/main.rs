use certinspect::config::{Config, OutputFormat, DEFAULT_CONFIG_FILE};
use certinspect::host::normalize;
use certinspect::output::{render_json, render_summary, render_text, Failure, Outcome};
use certinspect::Inspector;
use clap::Parser;
use env_logger::Env;
use log::error;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::mpsc;
use std::thread;

/// Inspect the TLS certificate presented by one or more hosts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hosts to inspect. A leading http(s):// and www. are stripped
    hosts: Vec<String>,

    /// Output format: json, text, summary
    #[arg(short, long)]
    output: Option<String>,

    /// TLS port to connect to
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds allowed for connect and handshake
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Exit code when a certificate is expired or an inspection failed
    #[arg(short, long)]
    exit_code: Option<i32>,

    /// Configuration file (defaults to ./certinspect.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if args.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    };
    let format = match config.output_format() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    };

    let hosts = config.hosts.clone().unwrap_or_default();
    if hosts.is_empty() {
        eprintln!("No hosts given. Pass them as arguments or list them in the config file.");
        exit(2);
    }

    let outcomes = inspect_all(config.inspector(), hosts);

    match format {
        OutputFormat::Json => match render_json(&outcomes) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to render JSON: {}", e);
                exit(2);
            }
        },
        OutputFormat::Text => print!("{}", render_text(&outcomes)),
        OutputFormat::Summary => println!("{}", render_summary(&outcomes)),
    }

    if outcomes.iter().any(Outcome::is_failure) {
        exit(config.exit_code.unwrap_or(0));
    }
}

fn load_config(args: &Args) -> Result<Config, certinspect::config::ConfigError> {
    let file_config = match &args.config {
        Some(path) => Some(Config::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Some(Config::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => None,
    };

    let cli_config = Config {
        hosts: if args.hosts.is_empty() {
            None
        } else {
            Some(args.hosts.clone())
        },
        output: args.output.clone(),
        exit_code: args.exit_code,
        port: args.port,
        timeout_secs: args.timeout,
    };

    let mut config = Config::default();
    if let Some(file_config) = file_config {
        config = config.merge_with(file_config);
    }
    let config = config.merge_with(cli_config);
    config.validate()?;
    Ok(config)
}

/// Inspects every host on its own thread and returns outcomes in input order.
fn inspect_all(inspector: Inspector, hosts: Vec<String>) -> Vec<Outcome> {
    let (sender, receiver) = mpsc::channel();
    for (index, host) in hosts.iter().cloned().enumerate() {
        let sender = sender.clone();
        thread::spawn(move || {
            let result = match normalize(&host) {
                Some(hostname) => inspector.inspect(&hostname).map_err(Failure::from),
                None => Err(Failure::MissingParameter),
            };
            let _ = sender.send((index, Outcome { host, result }));
        });
    }
    drop(sender);

    let mut slots: Vec<Option<Outcome>> = hosts.iter().map(|_| None).collect();
    for (index, outcome) in receiver {
        slots[index] = Some(outcome);
    }

    slots
        .into_iter()
        .zip(hosts)
        .map(|(slot, host)| {
            slot.unwrap_or_else(|| {
                error!("worker for {} stopped without a result", host);
                Outcome {
                    host,
                    result: Err(Failure::Internal),
                }
            })
        })
        .collect()
}
