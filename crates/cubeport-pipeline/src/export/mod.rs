//! Tabular exporter
//!
//! Binds a set of flattened tables to one artifact file: a delimited text
//! file holding a single table, or a workbook with one sheet per table.

pub mod delimited;
pub mod workbook;

use crate::error::ExportError;
use crate::flatten::{FlatTable, RESULT_TABLE_NAME};
use cubeport_common::{CubeportError, TableCount};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// How results are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Delimited text for a single table, workbook for several
    #[default]
    Auto,
    /// Always delimited text; several tables are stacked into one
    Delimited,
    /// Always a workbook
    Workbook,
}

impl ExportMode {
    /// Pick the concrete format for a result with `table_count` tables
    pub fn resolve(self, table_count: usize) -> ArtifactFormat {
        match self {
            ExportMode::Auto if table_count > 1 => ArtifactFormat::Workbook,
            ExportMode::Auto | ExportMode::Delimited => ArtifactFormat::Delimited,
            ExportMode::Workbook => ArtifactFormat::Workbook,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::Auto => "auto",
            ExportMode::Delimited => "delimited",
            ExportMode::Workbook => "workbook",
        }
    }
}

impl FromStr for ExportMode {
    type Err = CubeportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ExportMode::Auto),
            "delimited" | "csv" => Ok(ExportMode::Delimited),
            "workbook" | "xlsx" => Ok(ExportMode::Workbook),
            _ => Err(CubeportError::invalid_setting("EXPORT_MODE", s)),
        }
    }
}

impl std::fmt::Display for ExportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete artifact file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Delimited,
    Workbook,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Delimited => "csv",
            ArtifactFormat::Workbook => "xlsx",
        }
    }
}

/// A written artifact and what went into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub format: ArtifactFormat,
    /// One entry per table (or sheet) in the file
    pub tables: Vec<TableCount>,
}

impl ExportArtifact {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Export `tables` to `<dir>/<base_name>.<ext>`.
///
/// In delimited form a multi-table result is stacked into a single table
/// whose columns are the union of all tables' columns.
pub fn export(
    tables: &[FlatTable],
    dir: &Path,
    base_name: &str,
    mode: ExportMode,
) -> Result<ExportArtifact, ExportError> {
    if tables.is_empty() {
        return Err(ExportError::EmptyArtifact);
    }

    let format = mode.resolve(tables.len());
    let path = dir.join(format!("{}.{}", base_name, format.extension()));

    let counts = match format {
        ArtifactFormat::Delimited => {
            let table = match tables {
                [single] => Cow::Borrowed(single),
                many => Cow::Owned(FlatTable::concat(RESULT_TABLE_NAME, many)),
            };
            delimited::write_table(&table, &path)?;
            vec![TableCount {
                table: table.name().to_string(),
                rows: table.row_count(),
            }]
        }
        ArtifactFormat::Workbook => {
            let sheets = workbook::write_workbook(tables, &path)?;
            sheets
                .into_iter()
                .zip(tables)
                .map(|(sheet, table)| TableCount {
                    table: sheet,
                    rows: table.row_count(),
                })
                .collect()
        }
    };

    let artifact = ExportArtifact {
        path,
        format,
        tables: counts,
    };

    info!(
        path = %artifact.path.display(),
        format = artifact.format.extension(),
        tables = artifact.tables.len(),
        rows = artifact.total_rows(),
        "Export artifact written"
    );

    Ok(artifact)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_mode_resolution() {
        assert_eq!(ExportMode::Auto.resolve(1), ArtifactFormat::Delimited);
        assert_eq!(ExportMode::Auto.resolve(3), ArtifactFormat::Workbook);
        assert_eq!(ExportMode::Delimited.resolve(3), ArtifactFormat::Delimited);
        assert_eq!(ExportMode::Workbook.resolve(1), ArtifactFormat::Workbook);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("CSV".parse::<ExportMode>().unwrap(), ExportMode::Delimited);
        assert_eq!("workbook".parse::<ExportMode>().unwrap(), ExportMode::Workbook);
        assert!("pdf".parse::<ExportMode>().is_err());
    }

    #[test]
    fn test_delimited_stacks_multiple_tables() {
        let dir = TempDir::new().unwrap();
        let tables = flatten(&json!({
            "a": [{"x": 1}],
            "b": [{"y": 2}, {"y": 3}],
            "ctx": "c"
        }))
        .unwrap();

        let artifact = export(&tables, dir.path(), "req_1", ExportMode::Delimited).unwrap();
        assert_eq!(artifact.path, dir.path().join("req_1.csv"));
        assert_eq!(artifact.total_rows(), 3);
        assert_eq!(
            std::fs::read_to_string(&artifact.path).unwrap(),
            "a.x,ctx,b.y\n1,c,\n,c,2\n,c,3\n"
        );
    }

    #[test]
    fn test_auto_writes_workbook_for_several_tables() {
        let dir = TempDir::new().unwrap();
        let tables = flatten(&json!({"a": [{"x": 1}], "b": [{"y": 2}]})).unwrap();

        let artifact = export(&tables, dir.path(), "multi", ExportMode::Auto).unwrap();
        assert_eq!(artifact.format, ArtifactFormat::Workbook);
        assert_eq!(artifact.path, dir.path().join("multi.xlsx"));
        assert_eq!(
            artifact.tables,
            vec![
                TableCount { table: "a".to_string(), rows: 1 },
                TableCount { table: "b".to_string(), rows: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_artifact() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            export(&[], dir.path(), "none", ExportMode::Auto).unwrap_err(),
            ExportError::EmptyArtifact
        ));
    }
}
