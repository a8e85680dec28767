//! Dashboard filtering, aggregation and statistics over report collections.
//!
//! Every function here is pure: the input slice is never modified and
//! identical inputs give identical outputs. Calendar-day computations take
//! the time zone as a parameter; the plain wrappers use the machine's
//! local zone like the browser dashboard did.

use std::collections::{BTreeMap, HashSet};

use chrono::{Days, Local, NaiveDate, TimeZone};
use serde::Serialize;

use crate::models::report::{parse_instant, Category, Report, ReportState};
use crate::models::review::Review;

/// Dashboard criteria. `None` fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub state: Option<ReportState>,
    pub category: Option<Category>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl ReportFilter {
    /// Parses a state selector where `"all"` or an empty string means any state.
    pub fn state_selector(value: &str) -> crate::error::Result<Option<ReportState>> {
        match value.trim() {
            "" | "all" => Ok(None),
            other => other.parse().map(Some),
        }
    }

    /// Parses a category selector where `"all"` or an empty string means any category.
    pub fn category_selector(value: &str) -> Option<Category> {
        match value.trim() {
            "" | "all" => None,
            other => Some(Category::from(other.to_string())),
        }
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    fn matches<Tz: TimeZone>(&self, report: &Report, needle: Option<&str>, tz: &Tz) -> bool {
        if self.state.is_some_and(|state| report.state != state) {
            return false;
        }
        if self.category.as_ref().is_some_and(|category| &report.category != category) {
            return false;
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = report.date_in(tz) else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }
        if let Some(needle) = needle {
            return report.title.to_lowercase().contains(needle)
                || report.description.to_lowercase().contains(needle);
        }
        true
    }
}

/// Reports matching every criterion, in their original order.
pub fn filter_reports_in<Tz: TimeZone>(all: &[Report], criteria: &ReportFilter, tz: &Tz) -> Vec<Report> {
    let needle = criteria.search_term();
    all.iter()
        .filter(|report| criteria.matches(report, needle.as_deref(), tz))
        .cloned()
        .collect()
}

pub fn filter_reports(all: &[Report], criteria: &ReportFilter) -> Vec<Report> {
    filter_reports_in(all, criteria, &Local)
}

/// Count per state; all three states are always present.
pub fn aggregate_by_state(reports: &[Report]) -> BTreeMap<ReportState, usize> {
    let mut counts: BTreeMap<ReportState, usize> = ReportState::ALL.iter().map(|state| (*state, 0)).collect();
    for report in reports {
        *counts.entry(report.state).or_default() += 1;
    }
    counts
}

/// Count per category display name ("semaforo danado").
pub fn aggregate_by_category(reports: &[Report]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for report in reports {
        *counts.entry(report.category.display_name()).or_default() += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub date: NaiveDate,
    /// Short day label, `dd/mm`.
    pub label: String,
    pub count: usize,
}

/// Reports per calendar day for the seven days ending on `today`, oldest first.
pub fn timeline_last_7_days_at<Tz: TimeZone>(reports: &[Report], today: NaiveDate, tz: &Tz) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = (0..7u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| TimelineEntry {
            date,
            label: date.format("%d/%m").to_string(),
            count: 0,
        })
        .collect();

    for date in reports.iter().filter_map(|report| report.date_in(tz)) {
        if let Some(entry) = entries.iter_mut().find(|entry| entry.date == date) {
            entry.count += 1;
        }
    }
    entries
}

pub fn timeline_last_7_days(reports: &[Report]) -> Vec<TimelineEntry> {
    timeline_last_7_days_at(reports, Local::now().date_naive(), &Local)
}

/// Headline figures of the home page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub total_reports: usize,
    pub resolved: usize,
    pub active_users: usize,
    /// Mean days between `fechaCreacion` and `fechaResolucion` of attended reports.
    pub average_resolution_days: f64,
}

pub fn summary_statistics(reports: &[Report]) -> SummaryStatistics {
    let resolved = reports
        .iter()
        .filter(|report| report.state == ReportState::Atendido)
        .count();
    let active_users = reports
        .iter()
        .map(|report| report.user_id.as_deref().unwrap_or("anonymous"))
        .collect::<HashSet<_>>()
        .len();

    let durations: Vec<f64> = reports
        .iter()
        .filter(|report| report.state == ReportState::Atendido)
        .filter_map(|report| {
            let start = parse_day_or_instant(report.created_at.as_deref()?)?;
            let end = parse_day_or_instant(report.resolved_at.as_deref()?)?;
            Some((end - start).num_seconds() as f64 / 86_400.0)
        })
        .collect();
    let average_resolution_days = if durations.is_empty() {
        0.0
    } else {
        let mean = durations.iter().sum::<f64>() / durations.len() as f64;
        (mean * 10.0).round() / 10.0
    };

    SummaryStatistics {
        total_reports: reports.len(),
        resolved,
        active_users,
        average_resolution_days,
    }
}

/// Accepts full RFC 3339 instants or bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_day_or_instant(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Some(instant) = parse_instant(value) {
        return Some(instant.with_timezone(&chrono::Utc));
    }
    let day = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()?;
    Some(day.and_hms_opt(0, 0, 0)?.and_utc())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub total: usize,
    pub average: f64,
    /// Count per star value, index 0 is one star.
    pub histogram: [usize; 5],
}

impl RatingSummary {
    /// Share of reviews with `stars`, as a percentage.
    pub fn percent(&self, stars: u8) -> f64 {
        if self.total == 0 || !(1..=5).contains(&stars) {
            return 0.0;
        }
        self.histogram[usize::from(stars - 1)] as f64 * 100.0 / self.total as f64
    }
}

pub fn rating_summary(reviews: &[Review]) -> RatingSummary {
    let mut histogram = [0usize; 5];
    let mut sum = 0u32;
    let mut total = 0usize;
    for review in reviews.iter().filter(|review| (1..=5).contains(&review.rating)) {
        histogram[usize::from(review.rating - 1)] += 1;
        sum += u32::from(review.rating);
        total += 1;
    }
    RatingSummary {
        total,
        average: if total == 0 { 0.0 } else { f64::from(sum) / total as f64 },
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn report(id: &str, state: ReportState, category: Category, timestamp: &str) -> Report {
        Report {
            id: id.to_string(),
            title: category.title(),
            description: format!("Descripción del reporte {id}"),
            category,
            state,
            lat: Some(9.93),
            lng: Some(-84.08),
            timestamp: timestamp.to_string(),
            photos: None,
            user_id: None,
            rating: None,
            contact: None,
            created_at: None,
            resolved_at: None,
        }
    }

    /// Ten reports, three of them attended (ids 2, 5 and 9).
    fn fixture() -> Vec<Report> {
        use Category::*;
        use ReportState::*;
        vec![
            report("1", Nuevo, Bache, "2024-06-01T08:00:00Z"),
            report("2", Atendido, SemaforoDanado, "2024-06-01T09:00:00Z"),
            report("3", EnRevision, Bache, "2024-06-02T10:00:00Z"),
            report("4", Nuevo, IluminacionDeficiente, "2024-06-03T11:00:00Z"),
            report("5", Atendido, Bache, "2024-06-03T12:00:00Z"),
            report("6", EnRevision, AlcantarillaDanada, "2024-06-04T13:00:00Z"),
            report("7", Nuevo, Otro, "2024-06-05T14:00:00Z"),
            report("8", Nuevo, SenalizacionDeficiente, "2024-06-06T15:00:00Z"),
            report("9", Atendido, Otro, "2024-06-07T16:00:00Z"),
            report("10", EnRevision, Bache, "not a date"),
        ]
    }

    fn ids(reports: &[Report]) -> Vec<&str> {
        reports.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn attended_with_all_categories_keeps_original_order() {
        let criteria = ReportFilter {
            state: ReportFilter::state_selector("atendido").unwrap(),
            category: ReportFilter::category_selector("all"),
            ..Default::default()
        };
        let filtered = filter_reports_in(&fixture(), &criteria, &Utc);
        assert_eq!(ids(&filtered), vec!["2", "5", "9"]);
    }

    #[test]
    fn search_looks_at_title_and_description_only() {
        let mut retitled = report("1", ReportState::Nuevo, Category::SemaforoDanado, "2024-06-01T08:00:00Z");
        retitled.title = "Cruce sin luces".into();
        let criteria = ReportFilter {
            search: Some("semaforo".into()),
            ..Default::default()
        };
        assert!(filter_reports_in(&[retitled.clone()], &criteria, &Utc).is_empty());

        let criteria = ReportFilter {
            search: Some("sin LUCES".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_reports_in(&[retitled], &criteria, &Utc)), vec!["1"]);
    }

    #[rstest]
    #[case::state_only(ReportFilter { state: Some(ReportState::Nuevo), ..Default::default() })]
    #[case::category_and_state(ReportFilter {
        state: Some(ReportState::EnRevision),
        category: Some(Category::Bache),
        ..Default::default()
    })]
    #[case::search(ReportFilter { search: Some("BACHE".into()), ..Default::default() })]
    #[case::dates(ReportFilter {
        date_from: NaiveDate::from_ymd_opt(2024, 6, 2),
        date_to: NaiveDate::from_ymd_opt(2024, 6, 5),
        ..Default::default()
    })]
    #[case::empty(ReportFilter::default())]
    fn filtering_is_an_idempotent_subset(#[case] criteria: ReportFilter) {
        let all = fixture();
        let once = filter_reports_in(&all, &criteria, &Utc);
        let twice = filter_reports_in(&once, &criteria, &Utc);

        assert_eq!(once, twice);
        assert!(once.iter().all(|r| all.contains(r)));
        assert_eq!(all, fixture(), "input must not be mutated");
    }

    #[test]
    fn criteria_combine_with_and() {
        let criteria = ReportFilter {
            state: Some(ReportState::EnRevision),
            category: Some(Category::Bache),
            ..Default::default()
        };
        assert_eq!(ids(&filter_reports_in(&fixture(), &criteria, &Utc)), vec!["3", "10"]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_or_description() {
        let by_title = ReportFilter {
            search: Some("  semaforo ".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_reports_in(&fixture(), &by_title, &Utc)), vec!["2"]);

        let by_description = ReportFilter {
            search: Some("REPORTE 10".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_reports_in(&fixture(), &by_description, &Utc)), vec!["10"]);

        let blank = ReportFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(filter_reports_in(&fixture(), &blank, &Utc).len(), 10);
    }

    #[test]
    fn date_bounds_are_inclusive_and_skip_unparseable_timestamps() {
        let criteria = ReportFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 6, 3),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 3),
            ..Default::default()
        };
        assert_eq!(ids(&filter_reports_in(&fixture(), &criteria, &Utc)), vec!["4", "5"]);

        let open_ended = ReportFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 6, 6),
            ..Default::default()
        };
        assert_eq!(ids(&filter_reports_in(&fixture(), &open_ended, &Utc)), vec!["8", "9"]);
    }

    #[test]
    fn dates_are_compared_in_the_given_time_zone() {
        // 02:00 UTC on the 3rd is still the 2nd in Costa Rica (UTC-6).
        let reports = vec![report("late", ReportState::Nuevo, Category::Bache, "2024-06-03T02:00:00Z")];
        let criteria = ReportFilter {
            date_to: NaiveDate::from_ymd_opt(2024, 6, 2),
            ..Default::default()
        };
        let costa_rica = chrono::FixedOffset::west_opt(6 * 3600).unwrap();
        assert_eq!(filter_reports_in(&reports, &criteria, &costa_rica).len(), 1);
        assert!(filter_reports_in(&reports, &criteria, &Utc).is_empty());
    }

    #[test]
    fn state_counts_sum_to_total() {
        let counts = aggregate_by_state(&fixture());
        assert_eq!(counts[&ReportState::Nuevo], 4);
        assert_eq!(counts[&ReportState::EnRevision], 3);
        assert_eq!(counts[&ReportState::Atendido], 3);
        assert_eq!(counts.values().sum::<usize>(), 10);

        let empty = aggregate_by_state(&[]);
        assert_eq!(empty.len(), 3);
        assert_eq!(empty.values().sum::<usize>(), 0);
    }

    #[test]
    fn category_counts_use_display_names() {
        let counts = aggregate_by_category(&fixture());
        assert_eq!(counts["bache"], 4);
        assert_eq!(counts["semaforo danado"], 1);
        assert_eq!(counts["alcantarilla danada"], 1);
        assert!(!counts.contains_key("semaforo_danado"));
    }

    #[test]
    fn timeline_has_seven_zero_filled_days_oldest_first() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let timeline = timeline_last_7_days_at(&fixture(), today, &Utc);

        assert_eq!(timeline.len(), 7);
        assert_eq!(timeline[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(timeline[6].date, today);
        assert_eq!(timeline[6].label, "07/06");
        let counts: Vec<usize> = timeline.iter().map(|e| e.count).collect();
        assert_eq!(counts, vec![2, 1, 2, 1, 1, 1, 1]);
        assert_eq!(counts.iter().sum::<usize>(), 9);

        let later = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let quiet = timeline_last_7_days_at(&fixture(), later, &Utc);
        assert_eq!(quiet.len(), 7);
        assert!(quiet.iter().all(|e| e.count == 0));
    }

    #[test]
    fn timeline_serializes_dates_as_iso_days() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let timeline = timeline_last_7_days_at(&fixture(), today, &Utc);
        let value = serde_json::to_value(&timeline[6]).unwrap();
        assert_eq!(value["date"], "2024-06-07");
        assert_eq!(value["label"], "07/06");
        assert_eq!(value["count"], 1);
    }

    #[test]
    fn summary_counts_resolved_users_and_resolution_time() {
        let mut reports = fixture();
        reports[1].user_id = Some("7".into());
        reports[1].created_at = Some("2024-06-01".into());
        reports[1].resolved_at = Some("2024-06-04".into());
        reports[4].user_id = Some("7".into());
        reports[4].created_at = Some("2024-06-03T00:00:00Z".into());
        reports[4].resolved_at = Some("2024-06-05T00:00:00Z".into());
        reports[0].user_id = Some("8".into());

        let summary = summary_statistics(&reports);
        assert_eq!(summary.total_reports, 10);
        assert_eq!(summary.resolved, 3);
        // "7", "8" and everyone without a user id as "anonymous"
        assert_eq!(summary.active_users, 3);
        assert_eq!(summary.average_resolution_days, 2.5);

        assert_eq!(summary_statistics(&[]).average_resolution_days, 0.0);
    }

    #[test]
    fn rating_summary_builds_histogram_and_average() {
        let review = |rating: u8| Review {
            id: rating.to_string(),
            user_id: None,
            user_name: "Ana".into(),
            rating,
            comment: "ok".into(),
            timestamp: String::new(),
        };
        let summary = rating_summary(&[review(5), review(4), review(5), review(0)]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.histogram, [0, 0, 0, 1, 2]);
        assert!((summary.average - 14.0 / 3.0).abs() < 1e-9);
        assert!((summary.percent(5) - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(rating_summary(&[]).average, 0.0);
    }
}
