//! CLI entry point and command definitions.

use crate::allocation::{self, AllocationManager};
use crate::client::response::{Body, Normalized, OutputPreference};
use crate::client::retry::ThreadSleeper;
use crate::client::{ApiClient, ClientConfig};
use crate::dts::{self, DtsManager, ALL_CONNECTOR_TYPES, CUSTOM_CONNECTOR_TYPES};
use crate::job_manager::{JobManager, ListQuery, LogQuery};
use crate::log_tailer::{JobLogSource, LogEvent, LogTailer};
use crate::payload::{build_payload, JobOptions};
use crate::profile::{configure_profile, ProfileStore};
use crate::settings::Settings;
use crate::table::schema::{Column, CONNECTOR_COLUMNS, JOB_COLUMNS, TRANSFER_COLUMNS};
use crate::table::{FilterSpec, SortSpec, TableView};
use crate::utils::{JobStatus, JOB_TYPES};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

/// ML Space command-line client.
#[derive(Parser)]
#[command(name = "mls")]
#[command(version)]
#[command(about = "Submit and monitor training jobs, manage data transfers")]
pub struct Cli {
    /// Log requests, retries and follow-state changes to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update a profile interactively
    Configure {
        /// Profile name (defaults to "default")
        #[arg(long, env = "MLS_PROFILE")]
        profile: Option<String>,
    },
    /// Training jobs
    Job {
        #[command(flatten)]
        common: CommonOptions,
        #[command(subcommand)]
        command: JobCommand,
    },
    /// Data-transfer connectors
    Connector {
        #[command(flatten)]
        common: CommonOptions,
        #[command(subcommand)]
        command: ConnectorCommand,
    },
    /// Scheduled data transfers
    Transfer {
        #[command(flatten)]
        common: CommonOptions,
        #[command(subcommand)]
        command: TransferCommand,
    },
    /// Compute allocations of the workspace
    Allocation {
        #[command(flatten)]
        common: CommonOptions,
        #[command(subcommand)]
        command: AllocationCommand,
    },
    /// Queues inside an allocation
    Queue {
        #[command(flatten)]
        common: CommonOptions,
        #[command(subcommand)]
        command: QueueCommand,
    },
}

#[derive(Subcommand)]
pub enum AllocationCommand {
    /// List the workspace's allocations
    List,
    /// Instance types an allocation offers
    InstTypes { allocation_id: String },
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List the queues of an allocation
    List { allocation_id: String },
    /// Instance types a queue offers
    InstTypes { queue_id: String },
}

/// Options shared by every command that talks to the API.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonOptions {
    /// Profile to load credentials and defaults from
    #[arg(long, global = true, env = "MLS_PROFILE")]
    pub profile: Option<String>,

    /// Region (overrides the profile)
    #[arg(short = 'R', long, global = true)]
    pub region: Option<String>,

    /// Output format (overrides the profile)
    #[arg(short = 'O', long, value_enum, global = true)]
    pub output: Option<OutputPreference>,

    /// API endpoint (overrides the profile and MLS_ENDPOINT_URL)
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Submit a job
    Submit {
        /// JSON file with a base payload; flags override its fields
        #[arg(long)]
        payload: Option<PathBuf>,
        #[command(flatten)]
        options: JobOptions,
    },
    /// Show a job's status
    Status { name: String },
    /// Show, or follow, a job's logs
    Logs {
        name: String,
        /// Only the last N lines
        #[arg(short = 't', long, default_value_t = 0)]
        tail: u32,
        /// Verbose log output
        #[arg(short = 'v', long)]
        verbose: bool,
        /// Stream the logs while the job runs
        #[arg(short = 'f', long)]
        follow: bool,
        /// Wait for a pending job to start, then follow it
        #[arg(short = 'w', long)]
        wait: bool,
    },
    /// Stop a job
    Kill { name: String },
    /// Restart a job
    Restart { name: String },
    /// List jobs
    List {
        #[command(flatten)]
        filter: ListArgs,
    },
    /// List jobs as a table
    Table {
        #[command(flatten)]
        filter: ListArgs,
        /// Only jobs with this GPU count
        #[arg(short = 'g', long)]
        gpu_count: Option<u32>,
        /// Only jobs whose name contains this text
        #[arg(short = 'j', long)]
        job_name: Option<String>,
        /// Sort ascending by field (repeatable)
        #[arg(long, value_enum)]
        asc_sort: Vec<SortField>,
        /// Sort descending by field (repeatable)
        #[arg(long, value_enum)]
        desc_sort: Vec<SortField>,
    },
    /// Show the pods of a Spark job
    Pods { name: String },
    /// List the job types
    Types,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Allocation name
    #[arg(short = 'a', long)]
    pub allocation_name: Option<String>,
    /// Job status (repeatable)
    #[arg(short = 's', long, value_enum)]
    pub status: Vec<JobStatus>,
    /// Maximum number of jobs
    #[arg(short = 'l', long, default_value_t = 6000)]
    pub limit: u32,
    /// Offset from the start of the list
    #[arg(short = 'o', long, default_value_t = 0)]
    pub offset: u32,
}

/// Fields the job table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum SortField {
    GpuCount,
    InstanceType,
    JobDesc,
    JobName,
}

impl SortField {
    fn field(&self) -> &'static str {
        match self {
            SortField::GpuCount => "gpu_count",
            SortField::InstanceType => "instance_type",
            SortField::JobDesc => "job_desc",
            SortField::JobName => "job_name",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Render a table instead of the raw response
    #[arg(long)]
    pub table: bool,
    /// Page number, starting at 1
    #[arg(long)]
    pub page: Option<usize>,
    /// Records per page
    #[arg(long, default_value_t = 10)]
    pub per_page: usize,
}

#[derive(Subcommand)]
pub enum ConnectorCommand {
    /// Connector types and their parameters
    Sources,
    /// List connectors
    List {
        /// Only these connector ids (repeatable)
        #[arg(short = 'c', long = "connector-id")]
        ids: Vec<String>,
        /// Only connectors of this type
        #[arg(short = 't', long = "type", value_parser = clap::builder::PossibleValuesParser::new(ALL_CONNECTOR_TYPES))]
        source_type: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a connector
    Create {
        #[arg(short = 'n', long)]
        name: String,
        #[arg(short = 't', long = "type", value_parser = clap::builder::PossibleValuesParser::new(CUSTOM_CONNECTOR_TYPES))]
        source_type: String,
        /// Connector parameters as a JSON object
        #[arg(short = 'p', long, value_parser = parse_json)]
        params: Value,
        /// Share the connector with the whole workspace
        #[arg(long)]
        public: bool,
    },
    /// Replace a connector's parameters
    Update {
        id: String,
        #[arg(short = 't', long = "type", value_parser = clap::builder::PossibleValuesParser::new(CUSTOM_CONNECTOR_TYPES))]
        source_type: String,
        #[arg(short = 'p', long, value_parser = parse_json)]
        params: Value,
    },
    /// Activate a connector
    Activate {
        id: String,
        #[arg(short = 't', long = "type", value_parser = clap::builder::PossibleValuesParser::new(CUSTOM_CONNECTOR_TYPES))]
        source_type: String,
    },
    /// Deactivate a connector
    Deactivate {
        id: String,
        #[arg(short = 't', long = "type", value_parser = clap::builder::PossibleValuesParser::new(CUSTOM_CONNECTOR_TYPES))]
        source_type: String,
    },
    /// Delete connectors
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum TransferCommand {
    /// List transfers
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one transfer
    Get { id: String },
    /// Create a transfer from a JSON file
    Create {
        #[arg(short = 'f', long)]
        file: PathBuf,
    },
    /// Update a transfer
    Update {
        id: String,
        /// Fields to change as a JSON object
        #[arg(short = 'p', long, value_parser = parse_json)]
        params: Value,
    },
    /// Delete transfers
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Turn a transfer's schedule on or off
    Switch {
        id: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Cancel one scheduled run
    Cancel {
        id: String,
        /// Run to cancel, RFC 3339 (e.g. 2025-05-22T12:55:58Z)
        #[arg(short = 'e', long)]
        execution_date: DateTime<Utc>,
    },
    /// Show the logs of a transfer run
    Logs {
        id: String,
        #[arg(long)]
        history_id: Option<String>,
    },
    /// Show a transfer's run history
    History {
        id: String,
        #[arg(long)]
        source_name: Option<String>,
    },
}

fn parse_json(raw: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("not valid JSON: {}", e))
}

/// Run the parsed command line.
pub fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Configure { profile } => handle_configure(profile),
        Commands::Job { common, command } => {
            let config = Session::resolve(&common)?;
            handle_job(config, common.region.as_deref(), command)
        }
        Commands::Connector { common, command } => {
            let session = Session::open(&common)?;
            handle_connector(&session, command)
        }
        Commands::Transfer { common, command } => {
            let session = Session::open(&common)?;
            handle_transfer(&session, command)
        }
        Commands::Allocation { common, command } => {
            let session = Session::open(&common)?;
            let allocations = AllocationManager::new(&session.client);
            let response = match command {
                AllocationCommand::List => allocations.list_allocations(&session.workspace_id)?,
                AllocationCommand::InstTypes { allocation_id } => {
                    allocations.allocation_instance_types(&allocation_id)?
                }
            };
            Ok(emit_listing(&response))
        }
        Commands::Queue { common, command } => {
            let session = Session::open(&common)?;
            let allocations = AllocationManager::new(&session.client);
            let response = match command {
                QueueCommand::List { allocation_id } => {
                    allocations.list_queues(&session.workspace_id, &allocation_id)?
                }
                QueueCommand::InstTypes { queue_id } => allocations.queue_instance_types(&queue_id)?,
            };
            Ok(emit_listing(&response))
        }
    }
}

/// An authenticated client plus the region resolved for this invocation.
struct Session {
    client: ApiClient,
    region: String,
    workspace_id: String,
}

impl Session {
    fn open(common: &CommonOptions) -> Result<Self> {
        Self::connect(Self::resolve(common)?)
    }

    /// Load the profile and apply overrides. Sends nothing.
    fn resolve(common: &CommonOptions) -> Result<ClientConfig> {
        let settings = Settings::from_env();
        let name = common
            .profile
            .clone()
            .unwrap_or_else(|| settings.profile.clone());
        let store = ProfileStore::default_location().context("Failed to locate profile files")?;
        let profile = store
            .read_profile(&name)
            .with_context(|| format!("Failed to load profile '{}'", name))?;

        let config = ClientConfig::builder(settings, profile)
            .endpoint_url(common.endpoint_url.clone())
            .region(common.region.clone())
            .output(common.output)
            .build();
        debug!(
            "endpoint {} region {:?} output {:?}",
            config.transport.endpoint_url, config.region, config.output
        );
        Ok(config)
    }

    fn connect(config: ClientConfig) -> Result<Self> {
        let client = ApiClient::connect(&config).context("Failed to open API session")?;
        Ok(Self {
            client,
            region: config.region,
            workspace_id: config.credentials.workspace_id,
        })
    }
}

/// Print a response and map its HTTP status to an exit code.
fn emit(response: &Normalized) -> ExitCode {
    println!("{}", response.render());
    exit_code(response)
}

fn emit_listing(response: &Normalized) -> ExitCode {
    println!("{}", allocation::render_listing(response));
    exit_code(response)
}

fn exit_code(response: &Normalized) -> ExitCode {
    if response.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn handle_configure(profile: Option<String>) -> Result<ExitCode> {
    let name = profile.unwrap_or_else(|| Settings::from_env().profile);
    let store = ProfileStore::default_location().context("Failed to locate profile files")?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    configure_profile(&store, &name, &mut input, &mut output)
        .with_context(|| format!("Failed to configure profile '{}'", name))?;
    println!("Profile '{}' saved to {}", name, store.dir().display());
    Ok(ExitCode::SUCCESS)
}

/// `region_flag` is the explicit `-R`, which beats a region in the payload file.
fn handle_job(
    config: ClientConfig,
    region_flag: Option<&str>,
    command: JobCommand,
) -> Result<ExitCode> {
    // Payloads are checked before authenticating.
    let mut submission = match &command {
        JobCommand::Submit { payload, options } => Some(
            build_payload(payload.as_deref(), options, region_flag, &config.region)
                .context("Failed to build job payload")?,
        ),
        _ => None,
    };

    let session = Session::connect(config)?;
    let jobs = JobManager::new(&session.client);
    let region = session.region.as_str();

    let response = match command {
        JobCommand::Submit { .. } => {
            let payload = submission.take().context("job payload was not built")?;
            jobs.submit_job(payload)?
        }
        JobCommand::Status { name } => jobs.get_job_status(&name, region)?,
        JobCommand::Logs {
            name,
            tail,
            verbose,
            follow,
            wait,
        } => {
            let query = LogQuery { tail, verbose };
            if !(follow || wait) {
                jobs.get_job_logs(&name, region, query)?
            } else {
                return follow_logs(jobs, &name, region, query, wait);
            }
        }
        JobCommand::Kill { name } => jobs.kill_job(&name, region)?,
        JobCommand::Restart { name } => jobs.restart_job(&name)?,
        JobCommand::List { filter } => jobs.list_jobs(&list_query(&filter, region))?,
        JobCommand::Table {
            filter,
            gpu_count,
            job_name,
            asc_sort,
            desc_sort,
        } => {
            let response = jobs.list_jobs(&list_query(&filter, region))?;
            if response.is_error() {
                return Ok(emit(&response));
            }
            let filters = job_filters(&filter.status, gpu_count, job_name.as_deref());
            let sorts = sort_specs(&asc_sort, &desc_sort);
            let Some(body) = response.json() else {
                return Ok(emit(&response));
            };
            let view = TableView::build(jobs_of(body), JOB_COLUMNS, &filters, &sorts)
                .context("Failed to render job table")?;
            debug!("{} job(s) left after filtering", view.rows().len());
            println!("{}", view.render());
            return Ok(ExitCode::SUCCESS);
        }
        JobCommand::Pods { name } => jobs.get_pods(&name, region)?,
        JobCommand::Types => {
            println!("{}", JOB_TYPES.join("\n"));
            return Ok(ExitCode::SUCCESS);
        }
    };
    Ok(emit(&response))
}

fn list_query(args: &ListArgs, region: &str) -> ListQuery {
    ListQuery {
        region: region.to_string(),
        allocation_name: args.allocation_name.clone(),
        statuses: args.status.clone(),
        limit: args.limit,
        offset: args.offset,
    }
}

/// `GET jobs` wraps the list in `{"jobs": [...]}`.
fn jobs_of(body: &Value) -> &Value {
    body.get("jobs").unwrap_or(body)
}

fn job_filters(statuses: &[JobStatus], gpu_count: Option<u32>, job_name: Option<&str>) -> Vec<FilterSpec> {
    let mut filters = Vec::new();
    if let Some(count) = gpu_count {
        filters.push(FilterSpec::eq("gpu_count", count.to_string()));
    }
    if let Some(name) = job_name {
        filters.push(FilterSpec::like("job_name", name));
    }
    if !statuses.is_empty() {
        filters.push(
            FilterSpec::is_in(
                "status",
                statuses.iter().map(|s| s.as_str().to_string()).collect(),
            )
            .ignore_case(),
        );
    }
    filters
}

/// Ascending specs are applied before descending ones.
fn sort_specs(asc: &[SortField], desc: &[SortField]) -> Vec<SortSpec> {
    asc.iter()
        .map(|f| SortSpec::asc(f.field()))
        .chain(desc.iter().map(|f| SortSpec::desc(f.field())))
        .collect()
}

fn follow_logs(
    jobs: JobManager<'_>,
    name: &str,
    region: &str,
    query: LogQuery,
    wait: bool,
) -> Result<ExitCode> {
    let source = JobLogSource::new(jobs, name, region, query);
    let mut tailer = LogTailer::new(source, Arc::new(ThreadSleeper), wait);
    let mut code = ExitCode::SUCCESS;
    let stdout = io::stdout();

    tailer
        .follow(|event| {
            let mut out = stdout.lock();
            match event {
                LogEvent::Status(status) => writeln!(out, "{}", status)?,
                LogEvent::Chunk(chunk) => write!(out, "{}", chunk)?,
                LogEvent::Static(response) => {
                    writeln!(out, "{}", response.render())?;
                    code = exit_code(&response);
                }
            }
            out.flush()?;
            Ok(())
        })
        .with_context(|| format!("Failed to follow logs of {}", name))?;
    debug!("follow finished after {} streamed chunk(s)", tailer.emitted());
    Ok(code)
}

fn handle_connector(session: &Session, command: ConnectorCommand) -> Result<ExitCode> {
    let dts = DtsManager::new(&session.client);

    let response = match command {
        ConnectorCommand::Sources => dts.conn_sources()?,
        ConnectorCommand::List {
            ids,
            source_type,
            page,
        } => {
            if !dts::are_ids_valid(&ids) {
                bail!("Connector ids must be UUIDs");
            }
            let response = dts.conn_list(&ids, source_type.as_deref().unwrap_or(""))?;
            return present_list(&response, &page, CONNECTOR_COLUMNS);
        }
        ConnectorCommand::Create {
            name,
            source_type,
            params,
            public,
        } => {
            let connector = serde_json::json!({
                "name": name,
                "source_type": source_type,
                "parameters": params,
            });
            dts.conn_create(connector, public)?
        }
        ConnectorCommand::Update {
            id,
            source_type,
            params,
        } => dts.conn_update(&id, &source_type, params)?,
        ConnectorCommand::Activate { id, source_type } => dts.conn_activate(&id, &source_type)?,
        ConnectorCommand::Deactivate { id, source_type } => {
            dts.conn_deactivate(&id, &source_type)?
        }
        ConnectorCommand::Delete { ids } => {
            if !dts::are_ids_valid(&ids) {
                bail!("Connector ids must be UUIDs");
            }
            dts.conn_delete(&ids)?
        }
    };
    Ok(emit(&response))
}

fn handle_transfer(session: &Session, command: TransferCommand) -> Result<ExitCode> {
    let dts = DtsManager::new(&session.client);

    let response = match command {
        TransferCommand::List { page } => {
            let response = dts.transfer_list()?;
            return present_list(&response, &page, TRANSFER_COLUMNS);
        }
        TransferCommand::Get { id } => dts.transfer_get(&id)?,
        TransferCommand::Create { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let transfer: Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            dts.transfer_create(transfer)?
        }
        TransferCommand::Update { id, params } => dts.transfer_update(&id, params)?,
        TransferCommand::Delete { ids } => {
            if !dts::are_ids_valid(&ids) {
                bail!("Transfer ids must be UUIDs");
            }
            dts.transfer_delete(&ids)?
        }
        TransferCommand::Switch { id, active } => dts.transfer_switch(&id, active)?,
        TransferCommand::Cancel { id, execution_date } => {
            dts.transfer_cancel(&id, execution_date)?
        }
        TransferCommand::Logs { id, history_id } => {
            dts.transfer_logs(&id, history_id.as_deref())?
        }
        TransferCommand::History { id, source_name } => {
            dts.transfer_history(&id, source_name.as_deref())?
        }
    };
    Ok(emit(&response))
}

/// Print a list response, optionally paginated and as a table.
fn present_list(response: &Normalized, page: &PageArgs, columns: &[Column]) -> Result<ExitCode> {
    if response.is_error() {
        return Ok(emit(response));
    }
    let Some(data) = response.json() else {
        return Ok(emit(response));
    };

    let data = match page.page {
        Some(number) => Value::Array(dts::paginate(data, number, page.per_page)?),
        None => data.clone(),
    };

    if page.table {
        let view = TableView::build(&data, columns, &[], &[]).context("Failed to render table")?;
        println!("{}", view.render());
        return Ok(ExitCode::SUCCESS);
    }

    let paged = Normalized {
        body: Body::Json(data),
        ..response.clone()
    };
    Ok(emit(&paged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FilterKind;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_common_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mls", "job", "status", "lm-job-1", "-R", "A100-MT", "-O", "json", "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        let Commands::Job { common, command } = cli.command else {
            panic!("expected job command");
        };
        assert_eq!(common.region.as_deref(), Some("A100-MT"));
        assert_eq!(common.output, Some(OutputPreference::Json));
        assert!(matches!(command, JobCommand::Status { name } if name == "lm-job-1"));
    }

    #[test]
    fn test_list_defaults_and_repeated_status() {
        let cli = Cli::try_parse_from(["mls", "job", "list", "-s", "Running", "-s", "Pending"]).unwrap();
        let Commands::Job {
            command: JobCommand::List { filter },
            ..
        } = cli.command
        else {
            panic!("expected job list");
        };
        assert_eq!(filter.status, vec![JobStatus::Running, JobStatus::Pending]);
        assert_eq!(filter.limit, 6000);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn test_unknown_status_and_type_are_usage_errors() {
        assert!(Cli::try_parse_from(["mls", "job", "list", "-s", "Sleeping"]).is_err());
        assert!(Cli::try_parse_from(["mls", "connector", "activate", "x", "-t", "nfs"]).is_err());
        assert!(Cli::try_parse_from(["mls", "job", "list", "-O", "yaml"]).is_err());
    }

    #[test]
    fn test_connector_create_parses_params() {
        let cli = Cli::try_parse_from([
            "mls", "connector", "create", "-n", "bucket", "-t", "s3custom", "-p",
            r#"{"bucket": "b"}"#, "--public",
        ])
        .unwrap();
        let Commands::Connector {
            command: ConnectorCommand::Create { params, public, .. },
            ..
        } = cli.command
        else {
            panic!("expected connector create");
        };
        assert_eq!(params, json!({"bucket": "b"}));
        assert!(public);
    }

    #[test]
    fn test_transfer_cancel_parses_date() {
        let cli = Cli::try_parse_from([
            "mls", "transfer", "cancel", "t-1", "-e", "2025-05-22T12:55:58Z",
        ])
        .unwrap();
        let Commands::Transfer {
            command: TransferCommand::Cancel { execution_date, .. },
            ..
        } = cli.command
        else {
            panic!("expected transfer cancel");
        };
        assert_eq!(execution_date.to_rfc3339(), "2025-05-22T12:55:58+00:00");
    }

    #[test]
    fn test_job_table_specs() {
        let filters = job_filters(&[JobStatus::Running], Some(1), Some("lm-"));
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[2].kind, FilterKind::In);

        let sorts = sort_specs(&[SortField::JobName], &[SortField::GpuCount]);
        assert_eq!(sorts, vec![SortSpec::asc("job_name"), SortSpec::desc("gpu_count")]);
    }

    #[test]
    fn test_job_table_from_list_response() {
        let body = json!({"jobs": [
            {"job_name": "lm-a", "status": "Running", "gpu_count": 2},
            {"job_name": "lm-b", "status": "Completed", "gpu_count": 1},
            {"job_name": "other", "status": "Running", "gpu_count": 1}
        ]});
        let filters = job_filters(&[JobStatus::Running], None, Some("lm-"));
        let view = TableView::build(jobs_of(&body), JOB_COLUMNS, &filters, &[]).unwrap();
        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.rows()[0]["job_name"], "lm-a");
    }

    #[test]
    fn test_job_table_matches_api_spelling() {
        let body = json!({"jobs": [
            {"job_name": "lm-a", "status": "running", "gpu_count": 2.0},
            {"job_name": "lm-b", "status": "pending", "gpu_count": 1.0}
        ]});
        let by_gpu = job_filters(&[], Some(2), None);
        let view = TableView::build(jobs_of(&body), JOB_COLUMNS, &by_gpu, &[]).unwrap();
        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.rows()[0]["job_name"], "lm-a");

        let by_status = job_filters(&[JobStatus::Pending], None, None);
        let view = TableView::build(jobs_of(&body), JOB_COLUMNS, &by_status, &[]).unwrap();
        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.rows()[0]["job_name"], "lm-b");
    }

    #[test]
    fn test_profile_flag_reads_environment() {
        let command = Cli::command();
        for name in ["job", "configure", "connector"] {
            let sub = command.find_subcommand(name).unwrap();
            let profile = sub.get_arguments().find(|a| a.get_id() == "profile").unwrap();
            assert_eq!(profile.get_env(), Some(std::ffi::OsStr::new("MLS_PROFILE")));
        }
    }

    fn server_config(server: &mockito::Server) -> ClientConfig {
        use crate::client::retry::RetryPolicy;
        use crate::client::transport::TransportConfig;
        use crate::client::Credentials;
        use std::time::Duration;

        ClientConfig {
            transport: TransportConfig {
                endpoint_url: server.url(),
                connect_timeout: Duration::from_secs(2),
                read_timeout: Duration::from_secs(5),
                ssl_verify: true,
                retry: RetryPolicy::new(0, 0.1),
            },
            credentials: Credentials {
                key_id: "id".to_string(),
                key_secret: "secret".to_string(),
                workspace_id: "ws".to_string(),
                api_key: "key".to_string(),
            },
            region: "DGX2-MT".to_string(),
            output: OutputPreference::Json,
        }
    }

    fn submit(payload: Option<PathBuf>, options: JobOptions) -> JobCommand {
        JobCommand::Submit { payload, options }
    }

    #[test]
    fn test_incomplete_submission_sends_nothing() {
        let mut server = mockito::Server::new();
        let auth = server.mock("POST", "/service_auth").expect(0).create();
        let jobs = server.mock("POST", "/jobs").expect(0).create();

        let options = JobOptions {
            script: Some("/train.py".to_string()),
            ..Default::default()
        };
        let err = handle_job(server_config(&server), None, submit(None, options)).unwrap_err();

        assert!(format!("{:#}", err).contains("base_image"));
        auth.assert();
        jobs.assert();
    }

    #[test]
    fn test_submission_keeps_payload_file_region() {
        use mockito::Matcher;
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"script": "/train.py", "base_image": "img", "instance_type": "v100.1gpu", "type": "pytorch", "region": "A100-MT"}}"#
        )
        .unwrap();

        let mut server = mockito::Server::new();
        let _auth = server
            .mock("POST", "/service_auth")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": {"access_token": "TOKEN"}}"#)
            .create();
        let jobs = server
            .mock("POST", "/jobs")
            .match_body(Matcher::PartialJson(json!({"region": "A100-MT"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"job_name": "lm-mpi-job-1", "status": "Pending"}"#)
            .create();

        let command = submit(Some(file.path().to_path_buf()), JobOptions::default());
        let code = handle_job(server_config(&server), None, command).unwrap();

        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::SUCCESS));
        jobs.assert();
    }

    #[test]
    fn test_allocation_and_queue_commands_parse() {
        let cli = Cli::try_parse_from(["mls", "allocation", "list", "--output", "text"]).unwrap();
        let Commands::Allocation { common, command } = cli.command else {
            panic!("expected allocation command");
        };
        assert!(matches!(command, AllocationCommand::List));
        assert_eq!(common.output, Some(OutputPreference::Text));

        let cli = Cli::try_parse_from([
            "mls",
            "queue",
            "inst-types",
            "22222222-2222-4222-a222-222222222222",
        ])
        .unwrap();
        let Commands::Queue { command: QueueCommand::InstTypes { queue_id }, .. } = cli.command
        else {
            panic!("expected queue inst-types");
        };
        assert_eq!(queue_id, "22222222-2222-4222-a222-222222222222");

        assert!(Cli::try_parse_from(["mls", "queue", "list"]).is_err());
        assert!(Cli::try_parse_from(["mls", "allocation", "inst-types"]).is_err());
    }
}
