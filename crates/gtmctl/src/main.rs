// # gtmctl - GTM command line tool
//
// This binary is a THIN integration layer:
// - Reading configuration from environment variables
// - Initializing logging and the runtime
// - Building the HTTP services
// - Mapping subcommands to gtm-core operations
// - Printing results and mapping them to exit codes
//
// All reconciliation, monitoring and aggregation logic lives in gtm-core.
//
// ## Configuration
//
// - `GTM_API_BASE_URL`: Base URL of the API host (required)
// - `GTM_API_TOKEN`: API access token (required)
// - `GTM_POLL_INTERVAL_SECS`: Delay between propagation status polls (default 5)
// - `GTM_LOG_LEVEL`: trace, debug, info, warn or error (default warn)
//
// Logs go to stderr so `--json` output on stdout stays machine readable.
//
// ## Example
//
// ```bash
// export GTM_API_BASE_URL=https://akab-xxxx.luna.akamaiapis.net
// export GTM_API_TOKEN=your_token
//
// gtmctl update-datacenter example.akadns.net --datacenter east --disable --complete
// gtmctl update-property example.akadns.net www --datacenter 3131 --weight 25
// gtmctl query-status example.akadns.net --property www --period 1h
// ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gtm_api_http::{ApiClient, HttpConfigService, HttpReportService};
use gtm_core::period::DEFAULT_PERIOD_LEN;
use gtm_core::status::DatacenterTrafficStatus;
use gtm_core::{
    BatchReport, ConfigService, DesiredChange, EngineEvent, Error, GtmEngine, MonitorConfig,
    PropertyStatus, ReportService, ServiceConfig, StatusReporter, TargetOverride, UpdateOptions,
    UpdateStatus,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the different outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GtmExitCode {
    /// Every requested operation succeeded
    Success = 0,
    /// Configuration or startup error
    ConfigError = 1,
    /// The operation failed
    OperationFailed = 2,
    /// Some property updates failed, others succeeded
    PartialFailure = 3,
}

impl From<GtmExitCode> for ExitCode {
    fn from(code: GtmExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gtmctl",
    version,
    about = "Update GTM traffic targets and query their status"
)]
struct Cli {
    /// Show full deployment statuses and error details
    #[arg(long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enable or disable datacenters in every property of a domain
    UpdateDatacenter(UpdateDatacenterArgs),
    /// Update traffic targets or liveness tests of one property
    UpdateProperty(UpdatePropertyArgs),
    /// Show traffic per datacenter or the status of one property
    QueryStatus(QueryStatusArgs),
}

#[derive(Debug, Args)]
struct Toggle {
    /// Enable the selected datacenters or liveness tests
    #[arg(long, conflicts_with = "disable")]
    enable: bool,

    /// Disable the selected datacenters or liveness tests
    #[arg(long)]
    disable: bool,
}

impl Toggle {
    fn value(&self) -> Option<bool> {
        match (self.enable, self.disable) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Args)]
struct SubmitArgs {
    /// Wait until the change has propagated
    #[arg(long)]
    complete: bool,

    /// Maximum time to wait for propagation, in seconds
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Show the planned changes without submitting them
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Args)]
struct UpdateDatacenterArgs {
    /// GTM domain name
    domain: String,

    /// Datacenter id or nickname (repeatable, comma separated)
    #[arg(long = "datacenter", value_delimiter = ',', required = true)]
    datacenters: Vec<String>,

    #[command(flatten)]
    toggle: Toggle,

    #[command(flatten)]
    submit: SubmitArgs,
}

#[derive(Debug, Args)]
struct UpdatePropertyArgs {
    /// GTM domain name
    domain: String,

    /// Property name
    property: String,

    /// Datacenter id or nickname (repeatable, comma separated)
    #[arg(long = "datacenter", value_delimiter = ',')]
    datacenters: Vec<String>,

    #[command(flatten)]
    toggle: Toggle,

    /// Traffic weight for the single selected datacenter
    #[arg(long)]
    weight: Option<f64>,

    /// Server list for the single selected datacenter (repeatable, comma separated)
    #[arg(long = "server", value_delimiter = ',')]
    servers: Vec<String>,

    /// Traffic target as JSON, e.g. '{"datacenterId": 3131, "weight": 50}' (repeatable)
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Liveness test name (repeatable)
    #[arg(long = "liveness-test")]
    liveness_tests: Vec<String>,

    #[command(flatten)]
    submit: SubmitArgs,
}

#[derive(Debug, Args)]
struct QueryStatusArgs {
    /// GTM domain name
    domain: String,

    /// Datacenter id or nickname (repeatable, comma separated)
    #[arg(
        long = "datacenter",
        value_delimiter = ',',
        conflicts_with = "property",
        required_unless_present = "property"
    )]
    datacenters: Vec<String>,

    /// Property name
    #[arg(long)]
    property: Option<String>,

    /// Look-back period, e.g. 15m, 1h, 2d
    #[arg(long, default_value = DEFAULT_PERIOD_LEN)]
    period: String,
}

/// Application configuration
struct Config {
    base_url: String,
    api_token: String,
    poll_interval_secs: u64,
    log_level: String,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_token", &"<REDACTED>")
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env::var("GTM_API_BASE_URL").context(
                "GTM_API_BASE_URL is required. \
                Set it via: export GTM_API_BASE_URL=https://akab-xxxx.luna.akamaiapis.net",
            )?,
            api_token: env::var("GTM_API_TOKEN").context(
                "GTM_API_TOKEN is required. Set it via: export GTM_API_TOKEN=your_token",
            )?,
            poll_interval_secs: match env::var("GTM_POLL_INTERVAL_SECS") {
                Ok(value) => value
                    .parse()
                    .with_context(|| {
                        format!("GTM_POLL_INTERVAL_SECS must be a number. Got: {}", value)
                    })?,
                Err(_) => MonitorConfig::default().poll_interval_secs,
            },
            log_level: env::var("GTM_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "GTM_API_TOKEN appears to be a placeholder. \
                Use an actual API token."
            );
        }

        self.service().validate()?;
        MonitorConfig::new(self.poll_interval_secs, MonitorConfig::default().timeout_secs)
            .validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "GTM_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn service(&self) -> ServiceConfig {
        ServiceConfig::new(self.base_url.clone(), self.api_token.clone())
    }

    fn monitor(&self, timeout_secs: u64) -> MonitorConfig {
        MonitorConfig::new(self.poll_interval_secs, timeout_secs)
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return GtmExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return GtmExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GtmExitCode::ConfigError.into();
    }

    debug!("Configuration loaded: {:?}", config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GtmExitCode::ConfigError.into();
        }
    };

    rt.block_on(run(cli, config)).into()
}

/// Services shared by all subcommands
struct Services {
    config: Arc<dyn ConfigService>,
    reports: Arc<dyn ReportService>,
}

async fn run(cli: Cli, config: Config) -> GtmExitCode {
    let client = match ApiClient::new(&config.service()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e.user_message(cli.verbose));
            return GtmExitCode::ConfigError;
        }
    };
    let services = Services {
        config: Arc::new(HttpConfigService::with_client(client.clone())),
        reports: Arc::new(HttpReportService::with_client(client)),
    };

    let result = match &cli.command {
        Command::UpdateDatacenter(args) => update_datacenter(&cli, &config, &services, args).await,
        Command::UpdateProperty(args) => update_property(&cli, &config, &services, args).await,
        Command::QueryStatus(args) => query_status(&cli, &services, args).await,
    };

    match result {
        Ok(code) => code,
        Err(Error::AllUpdatesFailed(failures)) => {
            let report = BatchReport {
                failed_updates: failures,
                ..BatchReport::default()
            };
            if let Err(e) = print_batch(&report, cli.json, cli.verbose) {
                eprintln!("{}", e.user_message(cli.verbose));
            }
            GtmExitCode::OperationFailed
        }
        Err(e) => {
            eprintln!("{}", e.user_message(cli.verbose));
            GtmExitCode::OperationFailed
        }
    }
}

async fn update_datacenter(
    cli: &Cli,
    config: &Config,
    services: &Services,
    args: &UpdateDatacenterArgs,
) -> gtm_core::Result<GtmExitCode> {
    let (engine, events) =
        GtmEngine::new(services.config.clone(), config.monitor(args.submit.timeout))?;

    let ids = engine
        .resolve_datacenters(&args.domain, &args.datacenters)
        .await?;
    let mut change = DesiredChange::for_datacenters(ids);
    change.enabled = args.toggle.value();

    let options = submit_options(cli, &args.submit);
    let domain = args.domain.clone();
    let update = async move {
        let result = engine.update_datacenters(&domain, &change, options).await;
        // Closing the event channel ends the progress printer
        drop(engine);
        result
    };

    let (result, ()) = tokio::join!(update, print_progress(events));
    finish_batch(&result?, cli)
}

async fn update_property(
    cli: &Cli,
    config: &Config,
    services: &Services,
    args: &UpdatePropertyArgs,
) -> gtm_core::Result<GtmExitCode> {
    let (engine, events) =
        GtmEngine::new(services.config.clone(), config.monitor(args.submit.timeout))?;

    let ids = engine
        .resolve_datacenters(&args.domain, &args.datacenters)
        .await?;
    let change = property_change(args, ids)?;

    let options = submit_options(cli, &args.submit);
    let domain = args.domain.clone();
    let property = args.property.clone();
    let update = async move {
        let result = engine
            .update_property(&domain, &property, &change, options)
            .await;
        drop(engine);
        result
    };

    let (result, ()) = tokio::join!(update, print_progress(events));
    finish_batch(&result?, cli)
}

async fn query_status(
    cli: &Cli,
    services: &Services,
    args: &QueryStatusArgs,
) -> gtm_core::Result<GtmExitCode> {
    let reporter = StatusReporter::new(services.config.clone(), services.reports.clone());

    if let Some(property) = &args.property {
        let status = reporter
            .property_status(&args.domain, property, &args.period)
            .await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            print_property_status(&status);
        }
        return Ok(GtmExitCode::Success);
    }

    let ids = gtm_core::engine::resolve_datacenters(
        services.config.as_ref(),
        &args.domain,
        &args.datacenters,
    )
    .await?;
    let status = reporter
        .datacenter_status(&args.domain, &ids, &args.period)
        .await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_datacenter_status(&status);
    }
    Ok(GtmExitCode::Success)
}

fn submit_options(cli: &Cli, submit: &SubmitArgs) -> UpdateOptions {
    UpdateOptions::default()
        .verbose(cli.verbose)
        .dry_run(submit.dryrun)
        .wait_for_completion(submit.complete)
        .with_timeout(Duration::from_secs(submit.timeout))
}

/// Build the desired change for one property from the command line
fn property_change(
    args: &UpdatePropertyArgs,
    ids: Vec<gtm_core::DatacenterId>,
) -> gtm_core::Result<DesiredChange> {
    let toggle = args.toggle.value();
    let mut change = DesiredChange::for_datacenters(ids);

    // Without datacenters, --enable/--disable targets the liveness tests
    if !change.datacenters.is_empty() || args.liveness_tests.is_empty() {
        change.enabled = toggle;
    }
    if !args.liveness_tests.is_empty() {
        change.liveness_tests = args.liveness_tests.iter().cloned().collect();
        change.liveness_enabled = toggle;
    }

    change.weight = args.weight;
    if !args.servers.is_empty() {
        change.servers = Some(args.servers.clone());
    }

    for target in &args.targets {
        change = change.with_target(TargetOverride::from_json(target)?)?;
    }

    Ok(change)
}

/// Print engine progress to stderr until the engine is dropped
async fn print_progress(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::UpdateSubmitted { property_name, status } => {
                eprintln!("{}: submitted ({})", property_name, status.propagation_status);
            }
            EngineEvent::PropagationPending { .. } => eprint!("."),
            EngineEvent::PropagationFinished {
                property_name,
                outcome,
            } => {
                eprintln!();
                eprintln!("{}: {}", property_name, outcome.describe());
            }
            EngineEvent::UpdateFailed {
                property_name,
                error,
            } => {
                debug!("{}: {}", property_name, error);
            }
            EngineEvent::PropertyReconciled { .. } | EngineEvent::PropertyUnchanged { .. } => {}
        }
    }
}

fn finish_batch(report: &BatchReport, cli: &Cli) -> gtm_core::Result<GtmExitCode> {
    print_batch(report, cli.json, cli.verbose)?;
    if report.is_partial() {
        Ok(GtmExitCode::PartialFailure)
    } else {
        Ok(GtmExitCode::Success)
    }
}

fn print_batch(report: &BatchReport, json: bool, verbose: bool) -> gtm_core::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for planned in &report.planned_changes {
        println!("Property {}: planned changes (not submitted)", planned.property_name);
        for change in &planned.changes {
            println!(
                "  {} {}: {} -> {}",
                change.subject, change.field, change.from, change.to
            );
        }
    }

    for name in &report.unchanged_properties {
        println!("Property {}: no update required", name);
    }

    for updated in &report.updated_properties {
        match &updated.status {
            UpdateStatus::Detailed(status) => println!(
                "Property {}: change {} {} ({})",
                updated.property_name,
                status.change_id,
                status.propagation_status,
                status.message
            ),
            UpdateStatus::Summary { change_id } => {
                println!("Property {}: change {}", updated.property_name, change_id)
            }
        }
        if let Some(outcome) = &updated.completion {
            println!("  {}", outcome.describe());
        }
    }

    for failed in &report.failed_updates {
        if verbose {
            println!("Property {}: update failed: {}", failed.property_name, failed.fail_msg);
        } else {
            println!("Property {}: update failed", failed.property_name);
        }
    }

    Ok(())
}

fn print_property_status(status: &PropertyStatus) {
    println!("Property: {} ({})", status.property_name, status.domain);
    println!(
        "Period: {} to {} ({})",
        status.period_start, status.period_end, status.report_interval
    );
    println!(
        "Last update: {}  Cut off: {}",
        status
            .status_summary
            .last_update
            .as_deref()
            .unwrap_or("Not Available"),
        status.status_summary.cut_off
    );
    println!();
    println!(
        "{:<12} {:<16} {:<20} {:<8} {:>10} {:>8} {:<7} {:<40} {:<10} {:<6} {:>6}",
        "DATACENTER", "NICKNAME", "TARGET", "ENABLED", "REQUESTS", "USAGE", "STATUS", "IP",
        "HANDED OUT", "ALIVE", "SCORE"
    );

    for row in status.summary_rows() {
        let dc = row.datacenter;
        if row.continuation {
            print!("{:<12} {:<16} {:<20} {:<8} {:>10} {:>8} {:<7} ", "", "", "", "", "", "", "");
        } else {
            let enabled = dc
                .enabled
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string());
            print!(
                "{:<12} {:<16} {:<20} {:<8} {:>10} {:>8} {:<7} ",
                dc.datacenter_id,
                dc.nickname,
                dc.traffic_target_name,
                enabled,
                dc.total_requests,
                dc.property_usage,
                dc.status
            );
        }
        match row.ip {
            Some(ip) => println!(
                "{:<40} {:<10} {:<6} {:>6}",
                ip.ip, ip.handed_out, ip.alive, ip.score
            ),
            None => println!("{:<40} {:<10} {:<6} {:>6}", "-", "-", "-", "-"),
        }
    }
}

fn print_datacenter_status(status: &DatacenterTrafficStatus) {
    println!("Domain: {}", status.domain);
    println!("Period: {} to {}", status.period_start, status.period_end);
    for dc in &status.by_datacenter {
        println!();
        println!(
            "Datacenter {} ({}): {} requests",
            dc.datacenter_id, dc.nickname, dc.total_requests
        );
        for property in &dc.properties {
            println!(
                "  {:<30} {:>10}  status {}",
                property.name, property.requests, property.status
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use gtm_core::DatacenterId;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn property_args(cli: Cli) -> UpdatePropertyArgs {
        match cli.command {
            Command::UpdateProperty(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_enable_and_disable_conflict() {
        let result = Cli::try_parse_from([
            "gtmctl",
            "update-datacenter",
            "example.akadns.net",
            "--datacenter",
            "3131",
            "--enable",
            "--disable",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_datacenters_comma_separated() {
        let cli = parse(&[
            "gtmctl",
            "update-datacenter",
            "example.akadns.net",
            "--datacenter",
            "east,3132",
            "--disable",
            "--json",
        ]);
        assert!(cli.json);
        match cli.command {
            Command::UpdateDatacenter(args) => {
                assert_eq!(args.datacenters, vec!["east", "3132"]);
                assert_eq!(args.toggle.value(), Some(false));
                assert_eq!(args.submit.timeout, 300);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_toggle_applies_to_liveness_without_datacenters() {
        let args = property_args(parse(&[
            "gtmctl",
            "update-property",
            "example.akadns.net",
            "www",
            "--liveness-test",
            "http",
            "--disable",
        ]));

        let change = property_change(&args, Vec::new()).unwrap();
        assert_eq!(change.enabled, None);
        assert_eq!(change.liveness_enabled, Some(false));
        assert!(change.validate().is_ok());
    }

    #[test]
    fn test_toggle_with_datacenters_and_liveness_is_ambiguous() {
        let args = property_args(parse(&[
            "gtmctl",
            "update-property",
            "example.akadns.net",
            "www",
            "--datacenter",
            "3131",
            "--liveness-test",
            "http",
            "--enable",
        ]));

        let change = property_change(&args, vec![DatacenterId(3131)]).unwrap();
        assert!(change.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_targets_parsed() {
        let args = property_args(parse(&[
            "gtmctl",
            "update-property",
            "example.akadns.net",
            "www",
            "--target",
            r#"{"datacenterId": 3135, "weight": 10}"#,
        ]));

        let change = property_change(&args, Vec::new()).unwrap();
        assert_eq!(change.targets.len(), 1);
        assert_eq!(change.targets[0].datacenter_id, DatacenterId(3135));
    }

    #[test]
    fn test_query_requires_selector() {
        assert!(Cli::try_parse_from(["gtmctl", "query-status", "example.akadns.net"]).is_err());

        let cli = parse(&["gtmctl", "query-status", "example.akadns.net", "--property", "www"]);
        match cli.command {
            Command::QueryStatus(args) => assert_eq!(args.period, "15m"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = Config {
            base_url: "https://host".to_string(),
            api_token: "secret_token_12345".to_string(),
            poll_interval_secs: 5,
            log_level: "warn".to_string(),
        };
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_token"));
        assert!(config.validate().is_ok());
    }
}
