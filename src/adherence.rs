//! Adherence scoring engine.
//!
//! Pure functions over a snapshot of medication schedules and dose
//! events: classify each event into the timing window it most plausibly
//! fulfills, compute per-medication consumption ratios and milestone
//! badges, and grade how far off-schedule each classified event was.
//!
//! The engine performs no I/O and never reads the wall clock; running it
//! twice on the same snapshot produces identical output. Malformed input
//! (unknown window labels, zero quantities, orphaned medication
//! references) degrades to documented defaults instead of erroring.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event matches a window only within this many hours of its
/// canonical expected hour.
pub const MATCH_RADIUS_HOURS: f64 = 3.0;

/// Deviation tier boundaries (absolute offset from the expected hour).
pub const ON_TIME_MAX_OFFSET: f64 = 0.5;
pub const SLIGHTLY_OFF_MAX_OFFSET: f64 = 1.5;

/// Cumulative badge thresholds against the consumption ratio.
const BRONZE_RATIO: f64 = 0.33;
const SILVER_RATIO: f64 = 0.66;
const GOLD_RATIO: f64 = 0.93;

/// A named part of the day a medication is expected to be taken in.
/// The canonical expected hours are design constants: changing them
/// changes the meaning of every derived score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingWindow {
    Morning,
    Afternoon,
    Evening,
}

impl TimingWindow {
    pub const ALL: [TimingWindow; 3] = [
        TimingWindow::Morning,
        TimingWindow::Afternoon,
        TimingWindow::Evening,
    ];

    /// Canonical expected hour on a 24-hour clock.
    pub const fn expected_hour(self) -> f64 {
        match self {
            TimingWindow::Morning => 9.0,
            TimingWindow::Afternoon => 14.0,
            TimingWindow::Evening => 19.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TimingWindow::Morning => "Morning",
            TimingWindow::Afternoon => "Afternoon",
            TimingWindow::Evening => "Evening",
        }
    }

    /// Parse a declared window label. Unrecognized labels yield `None`
    /// and are ignored by the classifier.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "Morning" => Some(TimingWindow::Morning),
            "Afternoon" => Some(TimingWindow::Afternoon),
            "Evening" => Some(TimingWindow::Evening),
            _ => None,
        }
    }
}

/// Parse a schedule's comma-separated timing field into its declared
/// windows, preserving declaration order. Unrecognized entries are
/// dropped; an empty result means every event is unclassified.
pub fn declared_windows(timing: &str) -> Vec<TimingWindow> {
    timing.split(',').filter_map(TimingWindow::parse).collect()
}

/// Three-level deviation from the expected hour, used for marker
/// coloring in the consumption chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationTier {
    #[serde(rename = "on-time")]
    OnTime,
    #[serde(rename = "slightly-off")]
    SlightlyOff,
    #[serde(rename = "too-early-or-late")]
    TooEarlyOrLate,
}

impl DeviationTier {
    /// Grade a signed offset (actual − expected, in hours).
    pub fn from_offset(offset: f64) -> Self {
        let distance = offset.abs();
        if distance <= ON_TIME_MAX_OFFSET {
            DeviationTier::OnTime
        } else if distance <= SLIGHTLY_OFF_MAX_OFFSET {
            DeviationTier::SlightlyOff
        } else {
            DeviationTier::TooEarlyOrLate
        }
    }
}

/// Cumulative adherence milestones. A medication at 95% holds all three:
/// badges mark checkpoints passed, not mutually exclusive ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Bronze,
    Silver,
    Gold,
}

/// Schedule snapshot consumed by the engine.
#[derive(Debug, Clone)]
pub struct ScheduleSnapshot {
    pub id: Uuid,
    pub name: String,
    pub prescribed_qty: u32,
    pub timing: String,
}

/// Dose event snapshot consumed by the engine.
#[derive(Debug, Clone)]
pub struct DoseSnapshot {
    pub medication_id: Uuid,
    pub taken_at: NaiveDateTime,
}

/// Per-medication adherence summary. Keyed by medication ID; the name is
/// a display label only, so two schedules sharing a name stay separate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceSummary {
    pub medication_id: Uuid,
    pub medication_name: String,
    pub total: u32,
    pub consumed: u32,
    /// Rounded percentage; exceeds 100 on over-consumption, never clamped.
    pub percentage: u32,
    pub badges: Vec<Badge>,
}

/// A dose event assigned to a timing window, ready for plotting on a
/// time-of-day-by-date chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub date: NaiveDate,
    pub medication_id: Uuid,
    pub medication_name: String,
    pub window: TimingWindow,
    /// Hour-of-day with minute fraction, e.g. 9.5 for 09:30.
    pub actual_hour: f64,
    pub tier: DeviationTier,
}

/// Engine output: one summary per medication seen in the event set, plus
/// every classifiable event in chronological order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdherenceReport {
    pub summaries: Vec<AdherenceSummary>,
    pub events: Vec<ClassifiedEvent>,
}

/// Hour-of-day with minute fraction, in [0, 24).
pub fn fractional_hour(at: NaiveDateTime) -> f64 {
    f64::from(at.hour()) + f64::from(at.minute()) / 60.0
}

/// Classify an event time against a schedule's declared windows.
///
/// Returns the nearest declared window and the signed offset
/// (actual − expected) when the nearest window lies within
/// [`MATCH_RADIUS_HOURS`]; `None` otherwise. Equal distances resolve to
/// the first-declared window — an arbitrary but fixed tie-break.
pub fn classify(actual_hour: f64, windows: &[TimingWindow]) -> Option<(TimingWindow, f64)> {
    let mut best: Option<(TimingWindow, f64)> = None;
    let mut best_distance = f64::INFINITY;

    for &window in windows {
        let offset = actual_hour - window.expected_hour();
        let distance = offset.abs();
        if distance <= MATCH_RADIUS_HOURS && distance < best_distance {
            best = Some((window, offset));
            best_distance = distance;
        }
    }

    best
}

/// Badges earned at the given consumption level, lowest first.
fn earned_badges(consumed: u32, total: u32) -> Vec<Badge> {
    let consumed = f64::from(consumed);
    let total = f64::from(total);
    let mut badges = Vec::new();
    if consumed >= total * BRONZE_RATIO {
        badges.push(Badge::Bronze);
    }
    if consumed >= total * SILVER_RATIO {
        badges.push(Badge::Silver);
    }
    if consumed >= total * GOLD_RATIO {
        badges.push(Badge::Gold);
    }
    badges
}

/// Score a snapshot.
///
/// Summaries cover every medication with at least one dose event, in
/// schedule order. Unclassified events (no declared window within the
/// match radius) still count toward `consumed` but produce no chart
/// point. Events referencing a medication absent from the schedule set
/// are skipped entirely.
pub fn score(schedules: &[ScheduleSnapshot], doses: &[DoseSnapshot]) -> AdherenceReport {
    let by_id: HashMap<Uuid, &ScheduleSnapshot> =
        schedules.iter().map(|s| (s.id, s)).collect();
    let windows_by_id: HashMap<Uuid, Vec<TimingWindow>> = schedules
        .iter()
        .map(|s| (s.id, declared_windows(&s.timing)))
        .collect();

    let mut ordered_doses: Vec<&DoseSnapshot> = doses.iter().collect();
    ordered_doses.sort_by_key(|d| d.taken_at);

    let mut consumed_counts: HashMap<Uuid, u32> = HashMap::new();
    let mut events = Vec::new();

    for dose in ordered_doses {
        let Some(schedule) = by_id.get(&dose.medication_id) else {
            // Orphaned reference: the schedule was deleted after the
            // event was recorded.
            continue;
        };
        *consumed_counts.entry(schedule.id).or_insert(0) += 1;

        let actual_hour = fractional_hour(dose.taken_at);
        let windows = &windows_by_id[&schedule.id];
        if let Some((window, offset)) = classify(actual_hour, windows) {
            events.push(ClassifiedEvent {
                date: dose.taken_at.date(),
                medication_id: schedule.id,
                medication_name: schedule.name.clone(),
                window,
                actual_hour,
                tier: DeviationTier::from_offset(offset),
            });
        }
    }

    let summaries = schedules
        .iter()
        .filter_map(|schedule| {
            let consumed = *consumed_counts.get(&schedule.id)?;
            // Zero prescribed quantity falls back to 1 so the ratio is
            // defined; flagged as defensive, not a business rule.
            let denominator = schedule.prescribed_qty.max(1);
            let ratio = f64::from(consumed) / f64::from(denominator);
            Some(AdherenceSummary {
                medication_id: schedule.id,
                medication_name: schedule.name.clone(),
                total: schedule.prescribed_qty,
                consumed,
                percentage: (ratio * 100.0).round() as u32,
                badges: earned_badges(consumed, denominator),
            })
        })
        .collect();

    AdherenceReport { summaries, events }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn schedule(name: &str, qty: u32, timing: &str) -> ScheduleSnapshot {
        ScheduleSnapshot {
            id: Uuid::new_v4(),
            name: name.into(),
            prescribed_qty: qty,
            timing: timing.into(),
        }
    }

    fn dose(medication_id: Uuid, h: u32, m: u32) -> DoseSnapshot {
        DoseSnapshot {
            medication_id,
            taken_at: at(h, m),
        }
    }

    // ── window parsing ──────────────────────────────────────

    #[test]
    fn parses_declared_windows_in_order() {
        let windows = declared_windows("Evening, Morning");
        assert_eq!(windows, vec![TimingWindow::Evening, TimingWindow::Morning]);
    }

    #[test]
    fn unrecognized_labels_are_dropped() {
        assert_eq!(declared_windows("Night,Noon"), vec![]);
        assert_eq!(
            declared_windows("Night, Afternoon"),
            vec![TimingWindow::Afternoon]
        );
        assert_eq!(declared_windows(""), vec![]);
    }

    // ── classifier ──────────────────────────────────────────

    #[test]
    fn classification_is_deterministic() {
        let windows = declared_windows("Morning,Afternoon,Evening");
        let first = classify(10.25, &windows);
        for _ in 0..10 {
            assert_eq!(classify(10.25, &windows), first);
        }
    }

    #[test]
    fn picks_nearest_declared_window() {
        let windows = declared_windows("Morning,Afternoon,Evening");
        let (window, offset) = classify(15.0, &windows).unwrap();
        assert_eq!(window, TimingWindow::Afternoon);
        assert!((offset - 1.0).abs() < 1e-9);
    }

    #[test]
    fn match_radius_boundary_is_inclusive() {
        // Morning only; 12:00 is exactly 3.0h away → still Morning.
        let windows = vec![TimingWindow::Morning];
        let (window, offset) = classify(12.0, &windows).unwrap();
        assert_eq!(window, TimingWindow::Morning);
        assert!((offset - 3.0).abs() < 1e-9);

        // 12:01 is 3h01m away → unclassified.
        assert!(classify(12.0 + 1.0 / 60.0, &windows).is_none());
    }

    #[test]
    fn tie_resolves_to_first_declared() {
        // 16:30 is 2.5h from both Afternoon (14) and Evening (19).
        let windows = declared_windows("Afternoon,Evening");
        let (window, _) = classify(16.5, &windows).unwrap();
        assert_eq!(window, TimingWindow::Afternoon);

        let reversed = declared_windows("Evening,Afternoon");
        let (window, _) = classify(16.5, &reversed).unwrap();
        assert_eq!(window, TimingWindow::Evening);
    }

    #[test]
    fn no_declared_windows_means_unclassified() {
        assert!(classify(9.0, &[]).is_none());
    }

    #[test]
    fn offset_is_signed() {
        let windows = vec![TimingWindow::Afternoon];
        let (_, early) = classify(12.5, &windows).unwrap();
        assert!((early + 1.5).abs() < 1e-9);
        let (_, late) = classify(15.5, &windows).unwrap();
        assert!((late - 1.5).abs() < 1e-9);
    }

    // ── deviation tiers ─────────────────────────────────────

    #[test]
    fn deviation_tier_boundaries() {
        assert_eq!(DeviationTier::from_offset(0.0), DeviationTier::OnTime);
        assert_eq!(DeviationTier::from_offset(0.5), DeviationTier::OnTime);
        assert_eq!(DeviationTier::from_offset(-0.5), DeviationTier::OnTime);
        assert_eq!(DeviationTier::from_offset(0.6), DeviationTier::SlightlyOff);
        assert_eq!(DeviationTier::from_offset(-1.5), DeviationTier::SlightlyOff);
        assert_eq!(
            DeviationTier::from_offset(1.6),
            DeviationTier::TooEarlyOrLate
        );
        assert_eq!(
            DeviationTier::from_offset(3.0),
            DeviationTier::TooEarlyOrLate
        );
    }

    #[test]
    fn morning_tier_examples() {
        // Expected 9.0: 9:00 on-time, 9:36 slightly-off, 10:36 too late.
        let windows = vec![TimingWindow::Morning];
        let tier = |hour: f64| {
            let (_, offset) = classify(hour, &windows).unwrap();
            DeviationTier::from_offset(offset)
        };
        assert_eq!(tier(9.0), DeviationTier::OnTime);
        assert_eq!(tier(9.6), DeviationTier::SlightlyOff);
        assert_eq!(tier(10.6), DeviationTier::TooEarlyOrLate);
    }

    // ── badges & ratios ─────────────────────────────────────

    #[test]
    fn badges_are_cumulative() {
        assert_eq!(earned_badges(7, 10), vec![Badge::Bronze, Badge::Silver]);
        assert_eq!(
            earned_badges(10, 10),
            vec![Badge::Bronze, Badge::Silver, Badge::Gold]
        );
        assert_eq!(earned_badges(3, 10), vec![]);
        assert_eq!(earned_badges(4, 10), vec![Badge::Bronze]);
    }

    #[test]
    fn summary_percentage_and_badges() {
        let s = schedule("Metformin", 10, "Morning");
        let doses: Vec<_> = (0..7).map(|i| dose(s.id, 9, i)).collect();
        let report = score(&[s.clone()], &doses);

        assert_eq!(report.summaries.len(), 1);
        let summary = &report.summaries[0];
        assert_eq!(summary.medication_id, s.id);
        assert_eq!(summary.consumed, 7);
        assert_eq!(summary.total, 10);
        assert_eq!(summary.percentage, 70);
        assert_eq!(summary.badges, vec![Badge::Bronze, Badge::Silver]);
    }

    #[test]
    fn over_consumption_exceeds_hundred_percent() {
        let s = schedule("Metformin", 10, "Morning");
        let doses: Vec<_> = (0..15).map(|i| dose(s.id, 9, i % 60)).collect();
        let report = score(&[s], &doses);

        let summary = &report.summaries[0];
        assert_eq!(summary.percentage, 150);
        assert_eq!(
            summary.badges,
            vec![Badge::Bronze, Badge::Silver, Badge::Gold]
        );
    }

    #[test]
    fn zero_quantity_falls_back_to_one() {
        let s = schedule("Sample", 0, "Morning");
        let doses: Vec<_> = (0..3).map(|i| dose(s.id, 9, i)).collect();
        let report = score(&[s], &doses);

        let summary = &report.summaries[0];
        assert_eq!(summary.total, 0);
        assert_eq!(summary.percentage, 300);
    }

    #[test]
    fn unclassified_events_still_count_toward_consumed() {
        let s = schedule("Metformin", 10, "Morning");
        // 02:00 is 7h from Morning → unclassified, but still consumed.
        let doses = vec![dose(s.id, 2, 0), dose(s.id, 9, 0)];
        let report = score(&[s], &doses);

        assert_eq!(report.summaries[0].consumed, 2);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].window, TimingWindow::Morning);
    }

    #[test]
    fn same_name_schedules_stay_separate() {
        let a = schedule("Metformin", 10, "Morning");
        let b = schedule("Metformin", 5, "Evening");
        let doses = vec![dose(a.id, 9, 0), dose(b.id, 19, 0), dose(b.id, 19, 5)];
        let report = score(&[a.clone(), b.clone()], &doses);

        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.summaries[0].medication_id, a.id);
        assert_eq!(report.summaries[0].consumed, 1);
        assert_eq!(report.summaries[1].medication_id, b.id);
        assert_eq!(report.summaries[1].consumed, 2);
    }

    // ── whole-engine behavior ───────────────────────────────

    #[test]
    fn orphaned_events_are_skipped_without_error() {
        let s = schedule("Metformin", 10, "Morning");
        let doses = vec![dose(Uuid::new_v4(), 9, 0), dose(s.id, 9, 0)];
        let report = score(&[s], &doses);

        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].consumed, 1);
        assert_eq!(report.events.len(), 1);
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let report = score(&[], &[]);
        assert!(report.summaries.is_empty());
        assert!(report.events.is_empty());

        // Schedules with no events produce no summaries either.
        let report = score(&[schedule("Metformin", 10, "Morning")], &[]);
        assert!(report.summaries.is_empty());
    }

    #[test]
    fn events_are_chronological() {
        let s = schedule("Metformin", 10, "Morning,Evening");
        let day = |d: u32, h: u32| DoseSnapshot {
            medication_id: s.id,
            taken_at: NaiveDate::from_ymd_opt(2026, 3, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
        };
        let doses = vec![day(12, 19), day(10, 9), day(11, 9)];
        let report = score(&[s], &doses);

        let dates: Vec<u32> = report
            .events
            .iter()
            .map(|e| chrono::Datelike::day(&e.date))
            .collect();
        assert_eq!(dates, vec![10, 11, 12]);
    }

    #[test]
    fn scoring_is_idempotent() {
        let a = schedule("Metformin", 10, "Morning,Evening");
        let b = schedule("Lisinopril", 5, "Afternoon");
        let doses = vec![
            dose(a.id, 9, 10),
            dose(a.id, 18, 40),
            dose(b.id, 13, 0),
            dose(b.id, 2, 30),
        ];

        let first = score(&[a.clone(), b.clone()], &doses);
        let second = score(&[a, b], &doses);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn fractional_hour_has_minute_precision() {
        assert!((fractional_hour(at(9, 30)) - 9.5).abs() < 1e-9);
        assert!((fractional_hour(at(0, 0))).abs() < 1e-9);
        assert!((fractional_hour(at(23, 45)) - 23.75).abs() < 1e-9);
    }
}
