//! Helpers for generating datasource definitions from warehouse tables.

use crate::error::{SemLayerError, SemResult};
use crate::interaction::{InputProvider, ProgressReporter};
use crate::remote::{ColumnDescriptor, RemoteOperations};

/// Default datasource name for a fully-qualified table: its last dotted segment.
pub fn recommended_datasource_name(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}

/// Human-readable column listing, one `id [DATATYPE]` per line.
pub fn render_columns(columns: &[ColumnDescriptor]) -> String {
    let mut out = String::from("Columns:");
    for column in columns {
        out.push_str(&format!(
            "\n    {} [{}]",
            column.id,
            column.data_type.to_uppercase()
        ));
    }
    out
}

pub struct DatasourceHelper<'a, R, I, P> {
    remote: &'a R,
    input: &'a I,
    progress: &'a P,
    no_wizard: bool,
}

impl<'a, R, I, P> DatasourceHelper<'a, R, I, P>
where
    R: RemoteOperations,
    I: InputProvider,
    P: ProgressReporter,
{
    pub fn new(remote: &'a R, input: &'a I, progress: &'a P, no_wizard: bool) -> Self {
        Self {
            remote,
            input,
            progress,
            no_wizard,
        }
    }

    /// Use `option` if given, otherwise ask for it.
    ///
    /// With the wizard disabled a missing option is an error naming the flag.
    pub fn read_input(
        &self,
        option: Option<&str>,
        option_name: &str,
        header: Option<&str>,
        prompt: &str,
        default: Option<&str>,
    ) -> SemResult<String> {
        if let Some(value) = option {
            return Ok(value.to_string());
        }
        if self.no_wizard {
            return Err(SemLayerError::configuration(
                format!("Missing required option --{option_name} (or omit --no-wizard flag)"),
                Some(option_name),
            ));
        }
        if let Some(text) = header {
            self.input.header(text)?;
        }
        self.input.prompt(prompt, default)
    }

    /// Fetch a table's columns behind the progress indicator.
    pub fn describe_table(&self, table: &str) -> SemResult<Vec<ColumnDescriptor>> {
        self.progress
            .run(&format!("Fetching columns of {table}"), || {
                self.remote.list_columns(table)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, RemoteOperationKind};
    use crate::interaction::SilentProgress;
    use crate::remote::{
        ChartRequest, ChartResult, DatabaseCredentials, DatasourceDescriptor,
    };
    use crate::sync::ConfigArtifact;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct ScriptedInput {
        answer: String,
        seen: RefCell<Vec<String>>,
    }

    impl InputProvider for ScriptedInput {
        fn header(&self, text: &str) -> SemResult<()> {
            self.seen.borrow_mut().push(format!("header:{text}"));
            Ok(())
        }

        fn prompt(&self, prompt: &str, default: Option<&str>) -> SemResult<String> {
            self.seen
                .borrow_mut()
                .push(format!("prompt:{prompt}:{}", default.unwrap_or("-")));
            Ok(self.answer.clone())
        }
    }

    struct ColumnsOnly;

    fn unused<T>(operation: RemoteOperationKind) -> SemResult<T> {
        Err(SemLayerError::remote(operation, "unused"))
    }

    impl RemoteOperations for ColumnsOnly {
        fn list_columns(&self, table: &str) -> SemResult<Vec<ColumnDescriptor>> {
            assert_eq!(table, "warehouse.public.orders");
            Ok(vec![
                ColumnDescriptor {
                    id: "order_id".into(),
                    data_type: "integer".into(),
                },
                ColumnDescriptor {
                    id: "placed_at".into(),
                    data_type: "timestamp".into(),
                },
            ])
        }

        fn list_daily_datasources(
            &self,
            _version: Option<&str>,
        ) -> SemResult<BTreeMap<String, DatasourceDescriptor>> {
            unused(RemoteOperationKind::ListDailyDatasources)
        }

        fn submit_chart(&self, _request: &ChartRequest, _version: Option<&str>) -> SemResult<ChartResult> {
            unused(RemoteOperationKind::SubmitChart)
        }

        fn submit_db_auth(&self, _credentials: &DatabaseCredentials) -> SemResult<()> {
            unused(RemoteOperationKind::SubmitDbAuth)
        }

        fn fetch_current_config(&self) -> SemResult<Vec<u8>> {
            unused(RemoteOperationKind::FetchCurrentConfig)
        }

        fn fetch_config_by_version(&self, _version: &str) -> SemResult<Vec<u8>> {
            unused(RemoteOperationKind::FetchConfigByVersion)
        }

        fn upload_config(&self, _artifact: &ConfigArtifact) -> SemResult<()> {
            unused(RemoteOperationKind::UploadConfig)
        }

        fn trigger_backfill(&self, _date: NaiveDate, _version: Option<&str>) -> SemResult<()> {
            unused(RemoteOperationKind::TriggerBackfill)
        }
    }

    #[test]
    fn recommended_name_is_last_segment() {
        assert_eq!(recommended_datasource_name("warehouse.public.orders"), "orders");
        assert_eq!(recommended_datasource_name("orders"), "orders");
    }

    #[test]
    fn given_option_skips_prompt() {
        let input = ScriptedInput::default();
        let helper = DatasourceHelper::new(&ColumnsOnly, &input, &SilentProgress, true);

        let value = helper
            .read_input(Some("postgres"), "type", None, "Database type", None)
            .unwrap();

        assert_eq!(value, "postgres");
        assert!(input.seen.borrow().is_empty());
    }

    #[test]
    fn no_wizard_reports_missing_flag() {
        let input = ScriptedInput::default();
        let helper = DatasourceHelper::new(&ColumnsOnly, &input, &SilentProgress, true);

        let err = helper
            .read_input(None, "type", None, "Database type", None)
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(
            err.message(),
            "Missing required option --type (or omit --no-wizard flag)"
        );
    }

    #[test]
    fn wizard_shows_header_then_prompts() {
        let input = ScriptedInput {
            answer: "bigquery".into(),
            ..ScriptedInput::default()
        };
        let helper = DatasourceHelper::new(&ColumnsOnly, &input, &SilentProgress, false);

        let value = helper
            .read_input(None, "type", Some("Database"), "Database type", Some("postgres"))
            .unwrap();

        assert_eq!(value, "bigquery");
        assert_eq!(
            *input.seen.borrow(),
            vec![
                "header:Database".to_string(),
                "prompt:Database type:postgres".to_string()
            ]
        );
    }

    #[test]
    fn describe_table_renders_upper_case_types() {
        let input = ScriptedInput::default();
        let helper = DatasourceHelper::new(&ColumnsOnly, &input, &SilentProgress, false);

        let columns = helper.describe_table("warehouse.public.orders").unwrap();

        assert_eq!(
            render_columns(&columns),
            "Columns:\n    order_id [INTEGER]\n    placed_at [TIMESTAMP]"
        );
    }
}
