//! oraglot - Oracle database metrics and inventory collector.
//!
//! Connects to one Oracle database, runs the metric and inventory queries
//! once, and prints the resulting document on stdout. Logs go to stderr.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use oraglot_core::agent::{self, RunSummary};
use oraglot_core::config::{
    CollectionOptions, ConfigError, ConnectionParams, DEFAULT_MAX_SESSIONS, DEFAULT_PORT, Role,
};
use oraglot_core::integration::{INTEGRATION_NAME, Integration};
use oraglot_core::source::OracleSource;

/// Oracle database metrics and inventory collector.
#[derive(Parser, Debug)]
#[command(name = "oraglot", about = "Oracle database metrics and inventory collector", version)]
struct Args {
    /// Database host.
    #[arg(long, env = "ORACLE_HOSTNAME", default_value = "127.0.0.1")]
    hostname: String,

    /// Listener port.
    #[arg(long, env = "ORACLE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Service name to connect to.
    #[arg(long, env = "ORACLE_SERVICE_NAME", default_value = "")]
    service_name: String,

    /// Database user.
    #[arg(long, env = "ORACLE_USERNAME", default_value = "")]
    username: String,

    /// Password of the database user.
    #[arg(long, env = "ORACLE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Connect with the SYSDBA privilege.
    #[arg(long, env = "ORACLE_SYS_DBA")]
    sys_dba: bool,

    /// Connect with the SYSOPER privilege.
    #[arg(long, env = "ORACLE_SYS_OPER")]
    sys_oper: bool,

    /// Also report PGA and sysmetric statistics without a curated name.
    #[arg(long)]
    extended_metrics: bool,

    /// Collect metrics only.
    #[arg(long)]
    metrics: bool,

    /// Collect inventory only.
    #[arg(long)]
    inventory: bool,

    /// Number of database sessions shared by the collectors.
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,

    /// Pretty-print the output document.
    #[arg(long)]
    pretty: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn connection_params(&self) -> Result<ConnectionParams, ConfigError> {
        let params = ConnectionParams {
            hostname: self.hostname.clone(),
            port: self.port,
            service_name: self.service_name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            role: Role::from_flags(self.sys_dba, self.sys_oper)?,
            max_sessions: self.max_sessions,
        };
        params.validate()?;
        Ok(params)
    }

    fn collection_options(&self) -> CollectionOptions {
        CollectionOptions {
            metrics: self.metrics,
            inventory: self.inventory,
            extended_metrics: self.extended_metrics,
        }
    }
}

/// Initializes the tracing subscriber on stderr; stdout carries the document.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = log_level(verbose, quiet);

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("oraglot={}", level).parse().unwrap())
        .add_directive(format!("oraglot_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Describes a finished run for logging.
fn describe_summary(summary: &RunSummary) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(report) = &summary.metrics {
        parts.push(format!(
            "{}/{} collectors ok",
            report.succeeded, report.collectors
        ));
        parts.push(format!("{} observations", report.observations));
        if report.skipped_rows > 0 {
            parts.push(format!("{} skipped rows", report.skipped_rows));
        }
    }
    if let Some(stats) = &summary.inventory {
        parts.push(format!("{} inventory items", stats.items));
    }
    parts.push(format!("{} instances", summary.instances));
    parts.push(format!("{} tablespaces", summary.tablespaces));

    parts.join(", ")
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("oraglot {} starting", env!("CARGO_PKG_VERSION"));

    let params = match args.connection_params() {
        Ok(params) => params,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(
        connect_string = %params.connect_string(),
        username = %params.username,
        role = ?params.role,
        max_sessions = params.max_sessions,
        "connecting to database"
    );

    let source = match OracleSource::connect(params) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "cannot connect to database");
            std::process::exit(1);
        }
    };

    let mut integration = Integration::new(INTEGRATION_NAME, env!("CARGO_PKG_VERSION"));
    let summary = agent::run(&source, args.collection_options(), &mut integration);

    if summary.degraded() {
        let failed = summary
            .metrics
            .as_ref()
            .map(|r| {
                r.failed_groups
                    .iter()
                    .map(|g| g.name())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();
        warn!(
            failed_collectors = %failed,
            "collection incomplete: {}",
            describe_summary(&summary)
        );
    } else {
        info!(
            duration_ms = summary.elapsed.as_millis() as u64,
            "collected: {}",
            describe_summary(&summary)
        );
    }

    if let Err(e) = integration.publish(std::io::stdout().lock(), args.pretty) {
        error!(error = %e, "failed to write output document");
        std::process::exit(1);
    }
}
