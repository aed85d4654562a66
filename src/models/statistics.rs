// Persisted posture statistics record

use crate::models::activity::Activity;
use serde::{Deserialize, Serialize};

/// Number of fixed 3-hour time-of-day windows
pub const TIME_WINDOW_COUNT: usize = 8;

/// Display names of the time-of-day windows, indexed by `hour / 3`
pub const TIME_WINDOW_NAMES: [&str; TIME_WINDOW_COUNT] = [
    "0to3am", "3to6am", "6to9am", "9to12pm", "12to3pm", "3to6pm", "6to9pm", "9to0am",
];

/// Bad and total time accumulated for one bucket, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBucket {
    pub bad_ms: u64,
    pub total_ms: u64,
}

impl DurationBucket {
    pub fn add(&mut self, bad_ms: u64, total_ms: u64) {
        self.bad_ms += bad_ms;
        self.total_ms += total_ms;
    }

    /// Share of the bucket spent in bad posture (0-100), 0 when empty
    pub fn bad_percentage(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.bad_ms as f64 / self.total_ms as f64 * 100.0
        }
    }
}

/// Per-activity accumulators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBuckets {
    pub work: DurationBucket,
    pub study: DurationBucket,
    pub entertainment: DurationBucket,
}

impl ActivityBuckets {
    pub fn get(&self, activity: Activity) -> &DurationBucket {
        match activity {
            Activity::Work => &self.work,
            Activity::Study => &self.study,
            Activity::Entertainment => &self.entertainment,
        }
    }

    pub fn get_mut(&mut self, activity: Activity) -> &mut DurationBucket {
        match activity {
            Activity::Work => &mut self.work,
            Activity::Study => &mut self.study,
            Activity::Entertainment => &mut self.entertainment,
        }
    }
}

/// One archived day in the rolling history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyHistoryEntry {
    pub date: String,
    pub bad_ms: u64,
    pub total_ms: u64,
    pub bad_percentage: f64,
}

/// Aggregate statistics, one per installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsRecord {
    pub daily_bad_ms: u64,
    pub daily_total_ms: u64,
    /// `%Y-%m-%d` of the last day the monitor was used, empty before first use
    pub last_used_date: String,
    pub time_windows: [DurationBucket; TIME_WINDOW_COUNT],
    pub activities: ActivityBuckets,
    /// Longest single bad-posture episode in milliseconds.
    /// Despite the name this tracks bad posture; kept for stored-data compatibility.
    pub longest_good_posture_ms: u64,
    pub history: Vec<DailyHistoryEntry>,
    pub lowest_bad_percentage: Option<f64>,
    pub highest_bad_percentage: Option<f64>,
}

impl Default for StatisticsRecord {
    fn default() -> Self {
        Self {
            daily_bad_ms: 0,
            daily_total_ms: 0,
            last_used_date: String::new(),
            time_windows: [DurationBucket::default(); TIME_WINDOW_COUNT],
            activities: ActivityBuckets::default(),
            longest_good_posture_ms: 0,
            history: Vec::new(),
            lowest_bad_percentage: None,
            highest_bad_percentage: None,
        }
    }
}

impl StatisticsRecord {
    /// Sum of all time-window totals
    pub fn time_window_total_ms(&self) -> u64 {
        self.time_windows.iter().map(|w| w.total_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_percentage() {
        let mut bucket = DurationBucket::default();
        assert_eq!(bucket.bad_percentage(), 0.0);

        bucket.add(250, 1000);
        assert_eq!(bucket.bad_percentage(), 25.0);
    }

    #[test]
    fn test_activity_buckets() {
        let mut buckets = ActivityBuckets::default();
        buckets.get_mut(Activity::Study).add(10, 100);

        assert_eq!(buckets.get(Activity::Study).total_ms, 100);
        assert_eq!(buckets.get(Activity::Work), &DurationBucket::default());
    }

    #[test]
    fn test_record_defaults_on_partial_json() {
        // Older records missing newer fields still load
        let json = r#"{"daily_bad_ms": 5, "last_used_date": "2024-03-01"}"#;
        let record: StatisticsRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.daily_bad_ms, 5);
        assert_eq!(record.last_used_date, "2024-03-01");
        assert!(record.history.is_empty());
        assert!(record.highest_bad_percentage.is_none());
        assert_eq!(record.time_window_total_ms(), 0);
    }

    #[test]
    fn test_record_serialization() {
        let mut record = StatisticsRecord::default();
        record.time_windows[3].add(1, 2);
        record.history.push(DailyHistoryEntry {
            date: "2024-03-01".to_string(),
            bad_ms: 1,
            total_ms: 4,
            bad_percentage: 25.0,
        });

        let json = serde_json::to_string(&record).unwrap();
        let restored: StatisticsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }
}
