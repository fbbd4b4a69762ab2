//! Autonomous systems.

use std::fmt;

/// An autonomous system: its number and the name of its operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AutonomousSystem {
    number: u32,
    name: String,
}

impl AutonomousSystem {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Case-insensitive substring match on the name. An empty needle matches
    /// every AS.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

impl fmt::Display for AutonomousSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "AS{}", self.number)
        } else {
            write!(f, "AS{} - {}", self.number, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            AutonomousSystem::new(204867, "Lightning Wire Labs").to_string(),
            "AS204867 - Lightning Wire Labs"
        );
        assert_eq!(AutonomousSystem::new(1, "").to_string(), "AS1");
    }

    #[test]
    fn test_name_contains() {
        let a = AutonomousSystem::new(204867, "Lightning Wire Labs GmbH");
        assert!(a.name_contains("wire"));
        assert!(a.name_contains("LIGHTNING"));
        assert!(a.name_contains(""));
        assert!(!a.name_contains("ipfire"));
    }
}
