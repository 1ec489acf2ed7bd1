//! Subcommand handlers

pub mod datasource;
pub mod parser;

use crate::error::SemLayerError;
use crate::interaction::{InputProvider, ProgressReporter, SpinnerProgress};
use crate::remote::{ChartRequest, DatabaseCredentials, RemoteOperations};
use crate::sync::ConfigSyncManager;
use anyhow::Result;
use datasource::{recommended_datasource_name, render_columns, DatasourceHelper};
use parser::Commands;
use std::io::Write;
use tracing::debug;

/// Run one subcommand, writing its result to `out`.
///
/// Failures from the library surface as [`SemLayerError`] inside the returned
/// `anyhow::Error` so the caller can map them to exit codes.
pub fn execute<R, I, W>(
    command: Commands,
    manager: &ConfigSyncManager<R>,
    input: &I,
    out: &mut W,
) -> Result<()>
where
    R: RemoteOperations,
    I: InputProvider,
    W: Write,
{
    debug!("Executing {:?}", command);
    let progress = SpinnerProgress;

    match command {
        Commands::Push { version } => {
            let spinner = SpinnerProgress::spinner("Pushing configuration");
            let result = manager.push_with_progress(version.as_deref(), |phase| {
                spinner.set_message(format!("Push: {phase}"))
            });
            spinner.finish_and_clear();
            let report = result?;
            debug!(
                "Pushed {} files ({} bytes)",
                report.file_count, report.archive_size
            );
            writeln!(out, "OK")?;
        }
        Commands::Pull { version } => {
            let spinner = SpinnerProgress::spinner("Pulling configuration");
            let result = manager.pull_with_progress(version.as_deref(), |phase| {
                spinner.set_message(format!("Pull: {phase}"))
            });
            spinner.finish_and_clear();
            let report = result?;
            debug!("Pulled {} files", report.file_count);
            writeln!(out, "OK")?;
        }
        Commands::Backfill { date, version } => {
            progress.run("Triggering backfill", || {
                manager.backfill(date, version.as_deref())
            })?;
            writeln!(out, "OK")?;
        }
        Commands::Columns { table } => {
            let helper = DatasourceHelper::new(manager.remote(), input, &progress, true);
            let columns = helper.describe_table(&table)?;
            writeln!(out, "{}", render_columns(&columns))?;
            writeln!(
                out,
                "Suggested datasource name: {}",
                recommended_datasource_name(&table)
            )?;
        }
        Commands::Datasources { version } => {
            let datasources = progress.run("Fetching datasources", || {
                manager.remote().list_daily_datasources(version.as_deref())
            })?;
            writeln!(out, "{}", serde_json::to_string_pretty(&datasources)?)?;
        }
        Commands::Chart { request, version } => {
            let raw = std::fs::read_to_string(&request).map_err(|err| {
                SemLayerError::configuration(
                    format!("Failed to read chart request {}: {err}", request.display()),
                    Some("request"),
                )
            })?;
            let chart = ChartRequest::from_json(&raw).map_err(|err| {
                SemLayerError::configuration(
                    format!("Chart request is not valid JSON: {err}"),
                    Some("request"),
                )
            })?;
            let result = progress.run("Evaluating chart", || {
                manager.remote().submit_chart(&chart, version.as_deref())
            })?;
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }
        Commands::DbAuth {
            database_type,
            properties,
            no_wizard,
        } => {
            let helper = DatasourceHelper::new(manager.remote(), input, &progress, no_wizard);
            let database_type = helper.read_input(
                database_type.as_deref(),
                "type",
                Some("Warehouse credentials"),
                "Database type",
                None,
            )?;
            let credentials = properties
                .into_iter()
                .fold(DatabaseCredentials::new(database_type), |creds, (key, value)| {
                    creds.with_property(key, value)
                });
            progress.run("Submitting credentials", || {
                manager.remote().submit_db_auth(&credentials)
            })?;
            writeln!(out, "OK")?;
        }
    }

    Ok(())
}
