//! Proxy engine families

use crate::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Engine family a proxy speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineFamily {
    Mysql,
    Postgresql,
    Sqlserver,
}

impl EngineFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineFamily::Mysql => "MYSQL",
            EngineFamily::Postgresql => "POSTGRESQL",
            EngineFamily::Sqlserver => "SQLSERVER",
        }
    }

    /// Family of a database engine name as reported by RDS or written by an operator
    ///
    /// Accepts both `aurora-postgresql` and `AURORA_POSTGRESQL` spellings.
    pub fn from_engine(engine: &str) -> Option<Self> {
        let engine = engine.trim().to_ascii_lowercase().replace('_', "-");
        match engine.as_str() {
            "mysql" | "mariadb" | "aurora" | "aurora-mysql" => Some(EngineFamily::Mysql),
            "postgres" | "postgresql" | "aurora-postgresql" => Some(EngineFamily::Postgresql),
            e if e.starts_with("sqlserver") => Some(EngineFamily::Sqlserver),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EngineFamily {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MYSQL" => Ok(EngineFamily::Mysql),
            "POSTGRESQL" | "POSTGRES" => Ok(EngineFamily::Postgresql),
            "SQLSERVER" => Ok(EngineFamily::Sqlserver),
            other => Err(PlanError::InvalidConfig(format!(
                "unknown engine family '{}' (expected MYSQL, POSTGRESQL or SQLSERVER)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_engine() {
        assert_eq!(EngineFamily::from_engine("mysql"), Some(EngineFamily::Mysql));
        assert_eq!(EngineFamily::from_engine("MARIADB"), Some(EngineFamily::Mysql));
        assert_eq!(
            EngineFamily::from_engine("AURORA_POSTGRESQL"),
            Some(EngineFamily::Postgresql)
        );
        assert_eq!(EngineFamily::from_engine("POSTGRES"), Some(EngineFamily::Postgresql));
        assert_eq!(
            EngineFamily::from_engine("sqlserver-se"),
            Some(EngineFamily::Sqlserver)
        );
        assert_eq!(EngineFamily::from_engine("oracle-ee"), None);
    }

    #[test]
    fn test_parse_family() {
        assert_eq!("mysql".parse::<EngineFamily>().unwrap(), EngineFamily::Mysql);
        assert_eq!("POSTGRES".parse::<EngineFamily>().unwrap(), EngineFamily::Postgresql);
        assert!("DB2".parse::<EngineFamily>().is_err());
    }
}
