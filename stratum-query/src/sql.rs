//! SQL dialect helpers.

use serde::{Deserialize, Serialize};

/// The database dialect used when rendering filter placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// SQL Server uses @P1, @P2, etc.
    #[default]
    #[serde(alias = "sqlserver")]
    MSSQL,
    /// PostgreSQL uses $1, $2, etc.
    #[serde(alias = "postgres")]
    PostgreSQL,
    /// MySQL uses ?, ?, etc.
    MySQL,
    /// SQLite uses ?, ?, etc.
    SQLite,
}

impl DatabaseType {
    /// Get the parameter placeholder for this database type.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::MSSQL => format!("@P{}", index),
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }

    /// Whether the dialect supports `EXECUTE` of stored procedures.
    pub fn supports_procedures(&self) -> bool {
        !matches!(self, Self::SQLite)
    }
}
