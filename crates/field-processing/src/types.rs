//! Summary types recorded by a pipeline run.

use serde::{Deserialize, Serialize};

/// Kind of change a pipeline step made to the Working Table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    DataLoaded,
    ColumnsSwapped,
    AbsoluteValues,
    ValuesRenamed,
    WhitespaceStripped,
    WeatherJoined,
    ColumnRemoved,
}

/// One change applied during processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingAction {
    pub action_type: ActionType,
    /// Column(s) the action touched.
    pub target: String,
    pub description: String,
}

impl ProcessingAction {
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
        }
    }
}

/// Shape changes and actions of one `process` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Shape of the table returned by the query.
    pub rows_ingested: usize,
    pub columns_ingested: usize,

    /// Shape of the final table.
    pub rows_after: usize,
    pub columns_after: usize,

    /// Field rows without a weather-station match.
    pub unmatched_weather_rows: usize,

    pub actions: Vec<ProcessingAction>,
    pub warnings: Vec<String>,
}

impl ProcessingSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, action: ProcessingAction) {
        self.actions.push(action);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Rows added by the join (duplicated keys on the weather side).
    pub fn rows_added(&self) -> usize {
        self.rows_after.saturating_sub(self.rows_ingested)
    }
}
