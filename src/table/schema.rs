//! Column layouts for each resource shown as a table.

use super::format::{self, Formatter};

/// One table column: header text, dotted path into the row, cell formatter.
#[derive(Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub field: &'static str,
    pub format: Formatter,
}

const fn column(header: &'static str, field: &'static str, format: Formatter) -> Column {
    Column {
        header,
        field,
        format,
    }
}

pub const JOB_COLUMNS: &[Column] = &[
    column("Job name", "job_name", format::plain),
    column("Status", "status", format::plain),
    column("Region", "region", format::plain),
    column("Instance Type", "instance_type", format::plain),
    column("Description", "job_desc", format::plain),
    column("GPU count", "gpu_count", format::gpu_count),
    column("Duration", "duration", format::duration),
];

pub const CONNECTOR_COLUMNS: &[Column] = &[
    column("ID", "connector_id", format::plain),
    column("Name", "name", format::plain),
    column("Type", "source_type", format::plain),
    column("Status", "status", format::plain),
    column("System", "system", format::boolean),
    column("Modified", "modified", format::plain),
];

pub const TRANSFER_COLUMNS: &[Column] = &[
    column("ID", "transfer_id", format::plain),
    column("Name", "name", format::plain),
    column("Source", "query.source", format::plain),
    column("Destination", "query.destination", format::plain),
    column("Start at", "crontab.start_at", format::plain),
    column("Schedule", "crontab", format::schedule),
    column("Active", "active", format::boolean),
];
