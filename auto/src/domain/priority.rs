//! Task priority levels

use serde::{Deserialize, Serialize};

/// Priority for scheduler ordering; greater is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[default]
    NewTask,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewTask => write!(f, "NEW_TASK"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW_TASK" => Ok(Self::NewTask),
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::NewTask < Priority::Low);
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn test_priority_serde() {
        let json = serde_json::to_string(&Priority::NewTask).unwrap();
        assert_eq!(json, "\"NEW_TASK\"");

        let priority: Priority = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(priority, Priority::Critical);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("NEW_TASK".parse::<Priority>().unwrap(), Priority::NewTask);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
