//! Task registry loading.
//!
//! The registry is a CSV export of the team's task sheet with at least the
//! columns `Task`, `Priority`, `Deadline` and `In-Charge`. It is read in full
//! once per run; any failure aborts the run.

use std::path::PathBuf;

use tracing::info;

use crate::error::RegistryError;
use crate::pipeline::types::TaskRecord;

/// Columns every registry must provide, in record order.
pub const REQUIRED_COLUMNS: [&str; 4] = ["Task", "Priority", "Deadline", "In-Charge"];

/// Source of registry rows.
pub trait TaskSource: Send + Sync {
    /// Load every task. Called once per pipeline run.
    fn load(&self) -> Result<Vec<TaskRecord>, RegistryError>;
}

/// Fixed in-memory registry.
impl TaskSource for Vec<TaskRecord> {
    fn load(&self) -> Result<Vec<TaskRecord>, RegistryError> {
        Ok(self.clone())
    }
}

/// Registry backed by a CSV file.
#[derive(Debug, Clone)]
pub struct CsvRegistry {
    path: PathBuf,
}

impl CsvRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn unreadable(&self, err: impl std::fmt::Display) -> RegistryError {
        RegistryError::Unreadable {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }
}

impl TaskSource for CsvRegistry {
    fn load(&self) -> Result<Vec<TaskRecord>, RegistryError> {
        if !self.path.is_file() {
            return Err(RegistryError::NotFound {
                path: self.path.clone(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| self.unreadable(e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| self.unreadable(e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut required = [0usize; 4];
        for (slot, column) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| RegistryError::MissingColumn {
                    path: self.path.clone(),
                    column: column.to_string(),
                })?;
        }

        let mut tasks = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| self.unreadable(e))?;
            let get = |idx: usize| row.get(idx).unwrap_or("").to_string();

            let mut record = TaskRecord::new(
                get(required[0]),
                get(required[1]),
                get(required[2]),
                get(required[3]),
            );
            for (idx, header) in headers.iter().enumerate() {
                if !header.is_empty() && !REQUIRED_COLUMNS.contains(&header.as_str()) {
                    record.extra.insert(header.clone(), get(idx));
                }
            }
            tasks.push(record);
        }

        info!(path = %self.path.display(), tasks = tasks.len(), "Task registry loaded");
        Ok(tasks)
    }
}
