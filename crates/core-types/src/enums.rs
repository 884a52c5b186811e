use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The account status shown to users.
///
/// This is informational only: whether a customer counts as active in a given
/// month is decided by the presence of a cancellation date, not by this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomerStatus {
    Active,
    Cancelled,
}

impl CustomerStatus {
    /// The canonical label stored in the database and written to CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "Active",
            CustomerStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = CoreError;

    /// Accepts the English labels as well as the Portuguese ones found in
    /// older spreadsheets ("Ativo", "Cancelado").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" | "ativo" => Ok(CustomerStatus::Active),
            "cancelled" | "canceled" | "cancelado" => Ok(CustomerStatus::Cancelled),
            other => Err(CoreError::InvalidInput(
                "status".to_string(),
                other.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_english_and_portuguese_labels() {
        assert_eq!("Active".parse::<CustomerStatus>().unwrap(), CustomerStatus::Active);
        assert_eq!(" ativo ".parse::<CustomerStatus>().unwrap(), CustomerStatus::Active);
        assert_eq!("CANCELED".parse::<CustomerStatus>().unwrap(), CustomerStatus::Cancelled);
        assert_eq!("Cancelado".parse::<CustomerStatus>().unwrap(), CustomerStatus::Cancelled);
    }

    #[test]
    fn rejects_unknown_labels() {
        let err = "paused".parse::<CustomerStatus>().unwrap_err();
        assert_eq!(err, CoreError::InvalidInput("status".into(), "paused".into()));
    }
}
