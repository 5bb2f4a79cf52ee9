//! Job submission payload: an optional JSON file overlaid with flags.

use crate::error::{ApiError, Result};
use crate::utils::JOB_TYPES;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Fields every submission must carry once file and flags are merged.
const REQUIRED_FIELDS: [&str; 5] = ["script", "base_image", "instance_type", "region", "type"];

/// Submission fields settable from the command line.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct JobOptions {
    /// Path to the script inside the job image
    #[arg(short = 's', long)]
    pub script: Option<String>,

    /// Docker image the job runs in
    #[arg(short = 'i', long)]
    pub base_image: Option<String>,

    /// Instance type, e.g. v100.1gpu
    #[arg(short = 'I', long)]
    pub instance_type: Option<String>,

    /// Job type
    #[arg(short = 't', long = "type", value_parser = clap::builder::PossibleValuesParser::new(JOB_TYPES))]
    pub job_type: Option<String>,

    /// Number of workers
    #[arg(short = 'w', long)]
    pub n_workers: Option<u32>,

    /// Processes per worker
    #[arg(short = 'p', long)]
    pub n_processes: Option<u32>,

    /// Free-form job description
    #[arg(short = 'd', long)]
    pub job_desc: Option<String>,

    /// Conda environment to activate before the script
    #[arg(long)]
    pub conda_env: Option<String>,

    /// Environment variable as KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env_variables: Vec<String>,
}

/// Merge the payload file (if any) with the flags; flags win.
///
/// `region` is an explicit `-R` and overrides the file. `default_region` fills
/// the field only when neither supplied one.
pub fn build_payload(
    file: Option<&Path>,
    options: &JobOptions,
    region: Option<&str>,
    default_region: &str,
) -> Result<Value> {
    let mut payload = match file {
        Some(path) => read_payload_file(path)?,
        None => Map::new(),
    };

    let mut set = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            payload.insert(key.to_string(), value);
        }
    };
    set("script", options.script.clone().map(Value::from));
    set("base_image", options.base_image.clone().map(Value::from));
    set("instance_type", options.instance_type.clone().map(Value::from));
    set("type", options.job_type.clone().map(Value::from));
    set("n_workers", options.n_workers.map(Value::from));
    set("processes_per_worker", options.n_processes.map(Value::from));
    set("job_desc", options.job_desc.clone().map(Value::from));
    set("conda_env", options.conda_env.clone().map(Value::from));
    set("region", region.filter(|r| !r.is_empty()).map(Value::from));
    if !options.env_variables.is_empty() {
        set("env_variables", Some(Value::Object(parse_env(&options.env_variables)?)));
    }
    let has_region = payload.get("region").map_or(false, |v| !v.is_null());
    if !has_region && !default_region.is_empty() {
        payload.insert("region".to_string(), Value::from(default_region));
    }

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|key| payload.get(*key).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::Config(format!(
            "job payload is missing required field(s): {}",
            missing.join(", ")
        )));
    }

    Ok(Value::Object(payload))
}

fn read_payload_file(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::Config(format!(
            "{} must contain a JSON object",
            path.display()
        ))),
    }
}

fn parse_env(pairs: &[String]) -> Result<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), Value::from(value)))
            }
            _ => Err(ApiError::Config(format!(
                "environment variable '{}' is not KEY=VALUE",
                pair
            ))),
        })
        .collect()
}
