use std::io::Write;

use runtally_application::MonitorReport;
use runtally_core::{AppError, AppResult};

const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Column vocabulary of one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    /// Header of the entity column.
    pub entity_column: &'static str,
    /// Header of the sub-entity column.
    pub sub_entity_column: &'static str,
    /// Whether `IgnoreCount` is emitted.
    pub include_ignored: bool,
}

impl ReportLayout {
    /// Repository and workflow columns, without ignored counts.
    pub const GITHUB_WORKFLOWS: Self = Self {
        entity_column: "Repo",
        sub_entity_column: "WorkflowName",
        include_ignored: false,
    };

    /// Instance and document columns, with ignored counts.
    pub const SSM_COMMANDS: Self = Self {
        entity_column: "InstanceId",
        sub_entity_column: "DocumentName",
        include_ignored: true,
    };
}

/// Renders a monitor report as CSV, one row per aggregate cell.
#[derive(Debug, Clone, Copy)]
pub struct CsvReportWriter {
    layout: ReportLayout,
}

impl CsvReportWriter {
    /// Creates a writer for one column layout.
    #[must_use]
    pub fn new(layout: ReportLayout) -> Self {
        Self { layout }
    }

    /// Writes the header and every row, then flushes.
    pub fn write<W: Write>(&self, report: &MonitorReport, output: W) -> AppResult<()> {
        let mut writer = csv::Writer::from_writer(output);
        let timestamp = report
            .window
            .end()
            .format(REPORT_TIMESTAMP_FORMAT)
            .to_string();

        let mut header = vec![
            "Timestamp",
            self.layout.entity_column,
            self.layout.sub_entity_column,
            "SuccessCount",
            "FailedCount",
        ];
        if self.layout.include_ignored {
            header.push("IgnoreCount");
        }
        writer.write_record(&header).map_err(map_csv_error)?;

        for row in report.store.rows() {
            let mut record = vec![
                timestamp.clone(),
                row.entity.to_string(),
                row.sub_entity.to_string(),
                row.counters.success.to_string(),
                row.counters.failed.to_string(),
            ];
            if self.layout.include_ignored {
                record.push(row.counters.ignored.to_string());
            }
            writer.write_record(&record).map_err(map_csv_error)?;
        }

        writer
            .flush()
            .map_err(|error| AppError::Internal(format!("failed to flush report: {error}")))
    }
}

fn map_csv_error(error: csv::Error) -> AppError {
    AppError::Internal(format!("failed to write report row: {error}"))
}
