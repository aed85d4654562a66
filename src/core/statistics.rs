// Statistics aggregation: daily totals, time-of-day windows, activities and
// the rolling daily history.
//
// Each accounting scope (day, window, activity) keeps a mark. Elapsed time from
// the mark is credited when the scope is flushed, and bad time is the overlap
// of bad-posture episodes with that span, so an episode that straddles a
// boundary is split at the boundary instant. Spans are measured between
// absolute instants; the zone only picks the window and the calendar day.

use crate::core::time_window::{date_key, next_boundary, until_next_boundary, window_index};
use crate::models::activity::Activity;
use crate::models::statistics::{DailyHistoryEntry, StatisticsRecord, TIME_WINDOW_NAMES};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use tracing::{debug, info};

fn ms_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scope {
    mark: DateTime<Utc>,
    pending_bad_ms: u64,
}

impl Scope {
    fn new(mark: DateTime<Utc>) -> Self {
        Self {
            mark,
            pending_bad_ms: 0,
        }
    }

    /// Credit the part of a finished episode that falls after the mark
    fn credit_episode(&mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) {
        self.pending_bad_ms += ms_between(started_at.max(self.mark), ended_at);
    }

    /// Close the span [mark, until], returning (bad, total) and re-marking
    fn take(&mut self, until: DateTime<Utc>, open_episode: Option<DateTime<Utc>>) -> (u64, u64) {
        let total = ms_between(self.mark, until);
        let open = open_episode
            .map(|start| ms_between(start.max(self.mark), until))
            .unwrap_or(0);
        let bad = (self.pending_bad_ms + open).min(total);

        self.mark = until;
        self.pending_bad_ms = 0;
        (bad, total)
    }
}

/// Owns the statistics record for a session and applies every mutation to it.
/// Windows and days follow the wall clock of `Tz`.
#[derive(Debug, Clone)]
pub struct StatisticsAggregator<Tz: TimeZone = Local> {
    record: StatisticsRecord,
    history_days: usize,
    zone: Tz,
    tracking: bool,
    day: Option<Scope>,
    window: Option<Scope>,
    activity: Option<(Activity, Scope)>,
    selected_activity: Option<Activity>,
    open_episode: Option<DateTime<Utc>>,
}

impl StatisticsAggregator {
    /// Aggregator on the system's local time zone
    pub fn new(record: StatisticsRecord, history_days: usize) -> Self {
        Self::with_zone(record, history_days, Local)
    }
}

impl<Tz: TimeZone> StatisticsAggregator<Tz> {
    pub fn with_zone(record: StatisticsRecord, history_days: usize, zone: Tz) -> Self {
        Self {
            record,
            history_days: history_days.max(1),
            zone,
            tracking: false,
            day: None,
            window: None,
            activity: None,
            selected_activity: None,
            open_episode: None,
        }
    }

    pub fn record(&self) -> &StatisticsRecord {
        &self.record
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn current_activity(&self) -> Option<Activity> {
        self.activity.map(|(a, _)| a).or(self.selected_activity)
    }

    pub fn current_window(&self) -> Option<usize> {
        self.window.map(|w| window_index(w.mark, &self.zone))
    }

    /// Time until the next window boundary on this aggregator's wall clock
    pub fn until_next_window(&self, now: DateTime<Utc>) -> std::time::Duration {
        until_next_boundary(now, &self.zone)
    }

    /// Begin accounting: roll the day over if needed, stamp today's date and
    /// start the day, window and activity clocks. No-op while already tracking.
    pub fn start_tracking(&mut self, now: DateTime<Utc>) {
        if self.tracking {
            return;
        }

        self.roll_over_day(now);
        self.day = Some(Scope::new(now));
        self.window = Some(Scope::new(now));
        self.activity = self.selected_activity.map(|a| (a, Scope::new(now)));
        self.open_episode = None;
        self.tracking = true;

        info!(
            date = %self.record.last_used_date,
            window = window_index(now, &self.zone),
            activity = ?self.current_activity(),
            "Statistics tracking started"
        );
    }

    /// A bad-posture episode began at `at`
    pub fn on_bad_posture_started(&mut self, at: DateTime<Utc>) {
        if !self.tracking {
            return;
        }
        self.advance_to(at);
        self.open_episode = Some(at);
    }

    /// A bad-posture episode that began at `started_at` lasted `duration_seconds`
    pub fn on_bad_posture_episode(&mut self, started_at: DateTime<Utc>, duration_seconds: f64) {
        if !self.tracking {
            return;
        }

        let duration_ms = (duration_seconds.max(0.0) * 1000.0).round() as i64;
        let ended_at = started_at + Duration::milliseconds(duration_ms);
        self.open_episode = Some(started_at);
        self.advance_to(ended_at);
        self.open_episode = None;

        for scope in [self.day.as_mut(), self.window.as_mut()].into_iter().flatten() {
            scope.credit_episode(started_at, ended_at);
        }
        if let Some((_, scope)) = self.activity.as_mut() {
            scope.credit_episode(started_at, ended_at);
        }

        if duration_ms as u64 > self.record.longest_good_posture_ms {
            self.record.longest_good_posture_ms = duration_ms as u64;
        }
        debug!(duration_ms, "Bad posture episode recorded");
    }

    /// Switch the current activity, crediting the elapsed span to the old one
    pub fn on_activity_change(&mut self, activity: Activity, now: DateTime<Utc>) {
        self.selected_activity = Some(activity);
        if !self.tracking {
            return;
        }

        self.advance_to(now);
        self.flush_activity(now);
        self.activity = Some((activity, Scope::new(now)));
    }

    /// Window timer fired. Closes every window boundary passed since the last
    /// flush; ticks inside the current window change nothing.
    pub fn on_time_window_tick(&mut self, now: DateTime<Utc>) {
        if self.tracking {
            self.advance_to(now);
        }
    }

    /// Flush all open scopes into the record at `now` and return a copy for
    /// persisting. Scopes stay open.
    pub fn checkpoint(&mut self, now: DateTime<Utc>) -> StatisticsRecord {
        if self.tracking {
            self.advance_to(now);

            if let Some(day) = self.day.as_mut() {
                let (bad, total) = day.take(now, self.open_episode);
                self.record.daily_bad_ms += bad;
                self.record.daily_total_ms += total;
            }
            if let Some(window) = self.window.as_mut() {
                let index = window_index(window.mark, &self.zone);
                let (bad, total) = window.take(now, self.open_episode);
                self.record.time_windows[index].add(bad, total);
            }
            self.flush_activity(now);
        }
        self.record.clone()
    }

    /// Final flush for session end; accounting stops until tracking restarts
    pub fn finish(&mut self, now: DateTime<Utc>) -> StatisticsRecord {
        let record = self.checkpoint(now);
        self.tracking = false;
        self.day = None;
        self.window = None;
        self.activity = None;
        self.selected_activity = None;
        self.open_episode = None;
        record
    }

    /// Replace the record with zeroed defaults; open scopes restart at `now`
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.record = StatisticsRecord::default();
        if self.tracking {
            self.record.last_used_date = date_key(now, &self.zone);
            self.day = Some(Scope::new(now));
            self.window = Some(Scope::new(now));
            self.activity = self.activity.map(|(a, _)| (a, Scope::new(now)));
        }
    }

    fn flush_activity(&mut self, now: DateTime<Utc>) {
        if let Some((activity, scope)) = self.activity.as_mut() {
            let (bad, total) = scope.take(now, self.open_episode);
            self.record.activities.get_mut(*activity).add(bad, total);
        }
    }

    /// Close each window boundary between the window mark and `now`, rolling
    /// the day over when a boundary is midnight.
    fn advance_to(&mut self, now: DateTime<Utc>) {
        loop {
            let Some(window) = self.window.as_mut() else {
                return;
            };
            let boundary = next_boundary(window.mark, &self.zone);
            if boundary > now {
                return;
            }

            let index = window_index(window.mark, &self.zone);
            let (bad, total) = window.take(boundary, self.open_episode);
            self.record.time_windows[index].add(bad, total);
            debug!(
                window = TIME_WINDOW_NAMES[index],
                bad_ms = bad,
                total_ms = total,
                "Time window closed"
            );

            if date_key(boundary, &self.zone) != self.record.last_used_date {
                if let Some(day) = self.day.as_mut() {
                    let (bad, total) = day.take(boundary, self.open_episode);
                    self.record.daily_bad_ms += bad;
                    self.record.daily_total_ms += total;
                }
                self.roll_over_day(boundary);
            }
        }
    }

    /// Archive the stored day into the history when `today` is a new date
    fn roll_over_day(&mut self, today: DateTime<Utc>) {
        let key = date_key(today, &self.zone);
        if key == self.record.last_used_date {
            return;
        }

        if !self.record.last_used_date.is_empty() {
            self.archive_day();
        }

        self.record.daily_bad_ms = 0;
        self.record.daily_total_ms = 0;
        self.record.last_used_date = key;
    }

    fn archive_day(&mut self) {
        let record = &mut self.record;
        if record.daily_total_ms == 0 {
            debug!(date = %record.last_used_date, "No tracked time, day not archived");
            return;
        }

        let percentage = record.daily_bad_ms as f64 / record.daily_total_ms as f64 * 100.0;
        record.history.push(DailyHistoryEntry {
            date: record.last_used_date.clone(),
            bad_ms: record.daily_bad_ms,
            total_ms: record.daily_total_ms,
            bad_percentage: percentage,
        });
        if record.history.len() > self.history_days {
            let excess = record.history.len() - self.history_days;
            record.history.drain(..excess);
        }

        // A new value only ever moves one extremum
        if record.highest_bad_percentage.map_or(true, |h| percentage > h) {
            record.highest_bad_percentage = Some(percentage);
        } else if record.lowest_bad_percentage.map_or(true, |l| percentage < l) {
            record.lowest_bad_percentage = Some(percentage);
        }

        info!(
            date = %record.last_used_date,
            bad_percentage = percentage,
            "Archived daily posture statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::statistics::TIME_WINDOW_COUNT;
    use chrono_tz::America::New_York;

    const HOUR_MS: u64 = 3_600_000;
    const MINUTE_MS: u64 = 60_000;

    fn dt(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, h, m, s).unwrap()
    }

    fn aggregator(record: StatisticsRecord, history_days: usize) -> StatisticsAggregator<Utc> {
        StatisticsAggregator::with_zone(record, history_days, Utc)
    }

    fn tracking_at(now: DateTime<Utc>) -> StatisticsAggregator<Utc> {
        let mut stats = aggregator(StatisticsRecord::default(), 30);
        stats.start_tracking(now);
        stats
    }

    fn episode<Tz: TimeZone>(
        stats: &mut StatisticsAggregator<Tz>,
        start: DateTime<Utc>,
        seconds: f64,
    ) {
        stats.on_bad_posture_started(start);
        stats.on_bad_posture_episode(start, seconds);
    }

    #[test]
    fn test_day_of_ticks_partitions_exactly() {
        let mut stats = tracking_at(dt(1, 0, 0, 0));
        for hour in (3..=24).step_by(3) {
            let now = dt(1, 0, 0, 0) + Duration::hours(hour);
            stats.on_time_window_tick(now);
        }

        let record = stats.checkpoint(dt(2, 0, 0, 0));
        assert_eq!(record.time_window_total_ms(), 24 * HOUR_MS);
        for window in record.time_windows.iter() {
            assert_eq!(window.total_ms, 3 * HOUR_MS);
        }
    }

    #[test]
    fn test_irregular_and_late_ticks_do_not_lose_time() {
        let start = dt(1, 1, 17, 0);
        let mut stats = tracking_at(start);

        let mut now = start;
        for step in 0..200 {
            // Uneven spacing, occasionally skipping a whole window
            now += Duration::minutes(if step % 37 == 0 { 200 } else { 7 });
            stats.on_time_window_tick(now);
            if step % 50 == 0 {
                stats.checkpoint(now);
            }
        }

        let record = stats.checkpoint(now);
        assert_eq!(record.time_window_total_ms(), ms_between(start, now));
    }

    #[test]
    fn test_tick_inside_window_is_noop() {
        let mut stats = tracking_at(dt(1, 10, 0, 0));
        stats.on_time_window_tick(dt(1, 10, 30, 0));

        assert_eq!(stats.record().time_window_total_ms(), 0);
        assert_eq!(stats.current_window(), Some(3));
    }

    #[test]
    fn test_episode_split_at_window_boundary() {
        let mut stats = tracking_at(dt(1, 2, 0, 0));
        stats.on_bad_posture_started(dt(1, 2, 59, 0));
        stats.on_time_window_tick(dt(1, 3, 0, 0));
        stats.on_bad_posture_episode(dt(1, 2, 59, 0), 120.0);

        let record = stats.checkpoint(dt(1, 3, 30, 0));
        assert_eq!(record.time_windows[0].bad_ms, MINUTE_MS);
        assert_eq!(record.time_windows[0].total_ms, HOUR_MS);
        assert_eq!(record.time_windows[1].bad_ms, MINUTE_MS);
        assert_eq!(record.time_windows[1].total_ms, 30 * MINUTE_MS);
        assert_eq!(record.daily_bad_ms, 2 * MINUTE_MS);
        assert_eq!(record.longest_good_posture_ms, 2 * MINUTE_MS);
    }

    #[test]
    fn test_episode_split_without_timely_tick() {
        // Timer never fired; the episode end still splits at the boundary
        let mut stats = tracking_at(dt(1, 5, 0, 0));
        episode(&mut stats, dt(1, 5, 50, 0), 20.0 * 60.0);

        let record = stats.checkpoint(dt(1, 6, 10, 0));
        assert_eq!(record.time_windows[1].bad_ms, 10 * MINUTE_MS);
        assert_eq!(record.time_windows[2].bad_ms, 10 * MINUTE_MS);
        assert_eq!(record.time_window_total_ms(), 70 * MINUTE_MS);
    }

    #[test]
    fn test_longest_episode_tracks_maximum() {
        let mut stats = tracking_at(dt(1, 9, 0, 0));
        episode(&mut stats, dt(1, 9, 1, 0), 12.0);
        episode(&mut stats, dt(1, 9, 2, 0), 30.5);
        episode(&mut stats, dt(1, 9, 3, 0), 4.0);

        assert_eq!(stats.record().longest_good_posture_ms, 30_500);
    }

    #[test]
    fn test_activity_switch_credits_previous_activity() {
        let mut stats = aggregator(StatisticsRecord::default(), 30);
        stats.on_activity_change(Activity::Work, dt(1, 9, 0, 0));
        stats.start_tracking(dt(1, 9, 0, 0));

        episode(&mut stats, dt(1, 9, 10, 0), 5.0 * 60.0);
        stats.on_activity_change(Activity::Study, dt(1, 9, 30, 0));

        let record = stats.record();
        assert_eq!(record.activities.work.total_ms, 30 * MINUTE_MS);
        assert_eq!(record.activities.work.bad_ms, 5 * MINUTE_MS);
        assert_eq!(record.activities.study.total_ms, 0);
        assert_eq!(record.activities.study.bad_ms, 0);
        assert_eq!(stats.current_activity(), Some(Activity::Study));

        // Study accrues only its own span, starting clean
        episode(&mut stats, dt(1, 9, 40, 0), 60.0);
        stats.on_activity_change(Activity::Entertainment, dt(1, 10, 0, 0));
        let record = stats.record();
        assert_eq!(record.activities.study.total_ms, 30 * MINUTE_MS);
        assert_eq!(record.activities.study.bad_ms, MINUTE_MS);
        assert_eq!(record.activities.work.total_ms, 30 * MINUTE_MS);
    }

    #[test]
    fn test_activity_before_tracking_is_remembered() {
        let mut stats = aggregator(StatisticsRecord::default(), 30);
        stats.on_activity_change(Activity::Entertainment, dt(1, 8, 0, 0));
        assert_eq!(stats.record().activities.entertainment.total_ms, 0);

        stats.start_tracking(dt(1, 20, 0, 0));
        let record = stats.checkpoint(dt(1, 20, 45, 0));
        assert_eq!(record.activities.entertainment.total_ms, 45 * MINUTE_MS);
    }

    #[test]
    fn test_checkpoint_keeps_scopes_open() {
        let mut stats = tracking_at(dt(1, 13, 0, 0));
        stats.on_activity_change(Activity::Work, dt(1, 13, 0, 0));

        stats.checkpoint(dt(1, 13, 10, 0));
        let record = stats.checkpoint(dt(1, 13, 25, 0));

        assert_eq!(record.daily_total_ms, 25 * MINUTE_MS);
        assert_eq!(record.time_windows[4].total_ms, 25 * MINUTE_MS);
        assert_eq!(record.activities.work.total_ms, 25 * MINUTE_MS);
    }

    #[test]
    fn test_open_episode_flushed_on_checkpoint() {
        let mut stats = tracking_at(dt(1, 13, 0, 0));
        stats.on_bad_posture_started(dt(1, 13, 5, 0));
        let record = stats.checkpoint(dt(1, 13, 10, 0));
        assert_eq!(record.daily_bad_ms, 5 * MINUTE_MS);

        // The rest of the episode is credited once, when it ends
        stats.on_bad_posture_episode(dt(1, 13, 5, 0), 10.0 * 60.0);
        let record = stats.checkpoint(dt(1, 13, 20, 0));
        assert_eq!(record.daily_bad_ms, 10 * MINUTE_MS);
        assert_eq!(record.time_windows[4].bad_ms, 10 * MINUTE_MS);
    }

    #[test]
    fn test_rollover_archives_one_entry() {
        let mut record = StatisticsRecord::default();
        record.last_used_date = "2024-03-01".to_string();
        record.daily_bad_ms = 25_000;
        record.daily_total_ms = 100_000;

        let mut stats = aggregator(record, 30);
        stats.start_tracking(dt(2, 8, 0, 0));

        let record = stats.record();
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.history[0].date, "2024-03-01");
        assert_eq!(record.history[0].bad_percentage, 25.0);
        assert_eq!(record.highest_bad_percentage, Some(25.0));
        assert_eq!(record.lowest_bad_percentage, None);
        assert_eq!(record.daily_bad_ms, 0);
        assert_eq!(record.daily_total_ms, 0);
        assert_eq!(record.last_used_date, "2024-03-02");
    }

    #[test]
    fn test_rollover_updates_one_extremum() {
        let mut record = StatisticsRecord::default();
        record.last_used_date = "2024-03-01".to_string();
        record.highest_bad_percentage = Some(25.0);

        let mut stats = aggregator(record, 30);
        fn rollover(stats: &mut StatisticsAggregator<Utc>, day: u32, bad: u64) {
            let mut record = stats.record().clone();
            record.daily_bad_ms = bad;
            record.daily_total_ms = 100;
            *stats = aggregator(record, 30);
            stats.start_tracking(dt(day, 12, 0, 0));
            stats.finish(dt(day, 12, 0, 0));
        }

        rollover(&mut stats, 2, 10);
        assert_eq!(stats.record().highest_bad_percentage, Some(25.0));
        assert_eq!(stats.record().lowest_bad_percentage, Some(10.0));

        rollover(&mut stats, 3, 50);
        assert_eq!(stats.record().highest_bad_percentage, Some(50.0));
        assert_eq!(stats.record().lowest_bad_percentage, Some(10.0));
    }

    #[test]
    fn test_rollover_skips_empty_day() {
        let mut record = StatisticsRecord::default();
        record.last_used_date = "2024-03-01".to_string();

        let mut stats = aggregator(record, 30);
        stats.start_tracking(dt(2, 8, 0, 0));

        assert!(stats.record().history.is_empty());
        assert_eq!(stats.record().last_used_date, "2024-03-02");
    }

    #[test]
    fn test_midnight_rollover_during_session() {
        let mut stats = tracking_at(dt(1, 23, 0, 0));
        episode(&mut stats, dt(1, 23, 50, 0), 20.0 * 60.0);
        let record = stats.checkpoint(dt(2, 0, 30, 0));

        assert_eq!(record.history.len(), 1);
        let day_one = &record.history[0];
        assert_eq!(day_one.date, "2024-03-01");
        assert_eq!(day_one.total_ms, HOUR_MS);
        assert_eq!(day_one.bad_ms, 10 * MINUTE_MS);

        assert_eq!(record.last_used_date, "2024-03-02");
        assert_eq!(record.daily_total_ms, 30 * MINUTE_MS);
        assert_eq!(record.daily_bad_ms, 10 * MINUTE_MS);
        assert_eq!(record.time_windows[7].total_ms, HOUR_MS);
        assert_eq!(record.time_windows[0].total_ms, 30 * MINUTE_MS);
    }

    #[test]
    fn test_history_is_capped() {
        let mut record = StatisticsRecord::default();
        for day in 0..3 {
            record.history.push(DailyHistoryEntry {
                date: format!("2024-02-{:02}", day + 1),
                bad_ms: 1,
                total_ms: 10,
                bad_percentage: 10.0,
            });
        }
        record.last_used_date = "2024-02-28".to_string();
        record.daily_bad_ms = 1;
        record.daily_total_ms = 4;

        let mut stats = aggregator(record, 3);
        stats.start_tracking(dt(1, 8, 0, 0));

        let history = &stats.record().history;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].date, "2024-02-02");
        assert_eq!(history[2].date, "2024-02-28");
    }

    #[test]
    fn test_finish_stops_accounting() {
        let mut stats = tracking_at(dt(1, 9, 0, 0));
        stats.on_activity_change(Activity::Work, dt(1, 9, 0, 0));
        let record = stats.finish(dt(1, 10, 0, 0));
        assert_eq!(record.daily_total_ms, HOUR_MS);
        assert!(!stats.is_tracking());

        // Nothing accrues after the session ended
        stats.on_time_window_tick(dt(1, 15, 0, 0));
        let record = stats.checkpoint(dt(1, 16, 0, 0));
        assert_eq!(record.daily_total_ms, HOUR_MS);
        assert_eq!(record.time_window_total_ms(), HOUR_MS);
        assert_eq!(stats.current_activity(), None);
    }

    #[test]
    fn test_reset_zeroes_record() {
        let mut stats = tracking_at(dt(1, 9, 0, 0));
        stats.checkpoint(dt(1, 10, 0, 0));
        stats.reset(dt(1, 10, 0, 0));

        let record = stats.checkpoint(dt(1, 10, 15, 0));
        assert_eq!(record.daily_total_ms, 15 * MINUTE_MS);
        assert_eq!(record.time_window_total_ms(), 15 * MINUTE_MS);
        assert_eq!(record.time_windows.len(), TIME_WINDOW_COUNT);
    }

    #[test]
    fn test_fall_back_keeps_real_elapsed_time() {
        // 2024-11-03 00:30 EDT; clocks fall back from 02:00 EDT to 01:00 EST
        let start = Utc.with_ymd_and_hms(2024, 11, 3, 4, 30, 0).unwrap();
        let mut stats = StatisticsAggregator::with_zone(StatisticsRecord::default(), 30, New_York);
        stats.start_tracking(start);

        let mut now = start;
        for _ in 0..24 {
            now += Duration::minutes(10);
            stats.checkpoint(now);
        }

        // Four real hours: 00:30 EDT to 03:00 EST is 3.5 h, then 30 min of window 1
        let record = stats.record();
        assert_eq!(record.daily_total_ms, 4 * HOUR_MS);
        assert_eq!(record.time_window_total_ms(), 4 * HOUR_MS);
        assert_eq!(record.time_windows[0].total_ms, 3 * HOUR_MS + 30 * MINUTE_MS);
        assert_eq!(record.time_windows[1].total_ms, 30 * MINUTE_MS);
        assert_eq!(record.last_used_date, "2024-11-03");
    }

    #[test]
    fn test_fall_back_with_sparse_ticks() {
        let start = Utc.with_ymd_and_hms(2024, 11, 3, 5, 10, 0).unwrap();
        let mut stats = StatisticsAggregator::with_zone(StatisticsRecord::default(), 30, New_York);
        stats.start_tracking(start);

        // 01:10 EDT, then a single tick at 01:20 EST, an hour and ten minutes later
        let record = stats.checkpoint(start + Duration::minutes(70));
        assert_eq!(record.daily_total_ms, 70 * MINUTE_MS);
        assert_eq!(record.time_windows[0].total_ms, 70 * MINUTE_MS);
    }

    #[test]
    fn test_spring_forward_adds_no_phantom_hour() {
        // 2024-03-10 00:30 EST; 02:00 EST jumps to 03:00 EDT
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 5, 30, 0).unwrap();
        let mut stats = StatisticsAggregator::with_zone(StatisticsRecord::default(), 30, New_York);
        stats.start_tracking(start);
        episode(&mut stats, start + Duration::minutes(80), 20.0 * 60.0);

        let record = stats.checkpoint(start + Duration::minutes(150));
        assert_eq!(record.daily_total_ms, 150 * MINUTE_MS);
        // Window 0 ends at 03:00 EDT, 90 real minutes in
        assert_eq!(record.time_windows[0].total_ms, 90 * MINUTE_MS);
        assert_eq!(record.time_windows[0].bad_ms, 10 * MINUTE_MS);
        assert_eq!(record.time_windows[1].total_ms, HOUR_MS);
        assert_eq!(record.time_windows[1].bad_ms, 10 * MINUTE_MS);
    }
}
