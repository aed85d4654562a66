// User-selected activity and warning method

use serde::{Deserialize, Serialize};

/// Activity the user reports doing while being monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Work,
    Study,
    Entertainment,
}

impl Activity {
    pub fn to_string(&self) -> &'static str {
        match self {
            Activity::Work => "work",
            Activity::Study => "study",
            Activity::Entertainment => "entertainment",
        }
    }

    /// Parse an activity name; unknown names have no bucket and yield None
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "work" => Some(Activity::Work),
            "study" => Some(Activity::Study),
            "entertainment" => Some(Activity::Entertainment),
            _ => None,
        }
    }
}

/// How the user is warned about sustained bad posture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningMethod {
    Notification,
    Blur,
    None,
}

impl WarningMethod {
    pub fn to_string(&self) -> &'static str {
        match self {
            WarningMethod::Notification => "notification",
            WarningMethod::Blur => "blur",
            WarningMethod::None => "none",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "notification" => Some(WarningMethod::Notification),
            "blur" => Some(WarningMethod::Blur),
            "none" => Some(WarningMethod::None),
            _ => None,
        }
    }

    /// Whether this method produces a warning side effect at all
    pub fn warns(&self) -> bool {
        !matches!(self, WarningMethod::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_parsing() {
        assert_eq!(Activity::from_string("work"), Some(Activity::Work));
        assert_eq!(Activity::from_string("Study"), Some(Activity::Study));
        assert_eq!(
            Activity::from_string(" entertainment "),
            Some(Activity::Entertainment)
        );
        assert_eq!(Activity::from_string("gaming"), None);
    }

    #[test]
    fn test_warning_method_parsing() {
        assert_eq!(
            WarningMethod::from_string("notification"),
            Some(WarningMethod::Notification)
        );
        assert_eq!(WarningMethod::from_string("BLUR"), Some(WarningMethod::Blur));
        assert_eq!(WarningMethod::from_string("none"), Some(WarningMethod::None));
        assert_eq!(WarningMethod::from_string("email"), None);
        assert!(!WarningMethod::None.warns());
        assert!(WarningMethod::Blur.warns());
    }

    #[test]
    fn test_activity_serialization() {
        let json = serde_json::to_string(&Activity::Entertainment).unwrap();
        assert_eq!(json, "\"entertainment\"");
        assert_eq!(Activity::Work.to_string(), "work");
    }
}
