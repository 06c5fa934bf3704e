//! # Anomaly/Alert Engine
//! Periodic sweep over all registered regions: compare the current hour
//! against the previous hour and emit at most one alert draft per region.
//!
//! Rules are evaluated in a strict order and the first match wins:
//! absolute high EWI, sharp EWI increase, crisis-topic surge, volume
//! spike. Each rule standardizes its trigger value against a hardcoded
//! assumed (mean, std) pair; these are heuristic placeholders pending
//! rolling statistics from real history.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::aggregate::early_warning_index;
use crate::model::{
    AlertDraft, AlertType, Emotion, Recommendation, RecommendationKind, Request, Sentiment,
    Urgency,
};
use crate::regions::{self, Region};
use crate::store::RequestStore;
use crate::topic::CRISIS_TOPIC;
use crate::window::{hour_start, Window};

/// Minimum current-hour sample before a region is evaluated at all.
const MIN_SAMPLE: usize = 5;

// Per-rule (mean, std) z-score baselines. The volume rule standardizes
// against the previous hour itself (std = 30% of previous volume) and so
// has no fixed pair here.
const Z_HIGH_EWI: (f64, f64) = (0.3, 0.15);
const Z_EWI_SPIKE: (f64, f64) = (0.0, 0.1);
const Z_CRISIS_SURGE: (f64, f64) = (3.0, 2.0);

// Rule trigger constants.
const HIGH_EWI_THRESHOLD: f64 = 0.6;
const SPIKE_INCREASE_PCT: f64 = 40.0;
const SPIKE_EWI_FLOOR: f64 = 0.45;
const CRISIS_SURGE_PCT: f64 = 10.0;
const VOLUME_SPIKE_FACTOR: usize = 2;
const VOLUME_SPIKE_MIN_TOTAL: usize = 10;

/// One hour of per-region metrics.
///
/// The sweep's distress basket is {fear, pessimism, sadness} — wider than
/// the dashboard's four-bucket distress, which counts sadness separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourMetrics {
    pub total: usize,
    pub distress_pct: f64,
    pub high_urgency_pct: f64,
    pub negative_pct: f64,
    pub crisis_pct: f64,
    pub ewi: f64,
}

pub fn compute_metrics(requests: &[Request]) -> HourMetrics {
    let total = requests.len();
    let distress = requests
        .iter()
        .filter(|r| {
            matches!(
                r.emotion,
                Some(Emotion::Fear | Emotion::Pessimism | Emotion::Sadness)
            )
        })
        .count();
    let high_urgency = requests
        .iter()
        .filter(|r| r.urgency == Some(Urgency::High))
        .count();
    let negative = requests
        .iter()
        .filter(|r| r.sentiment() == Sentiment::Negative)
        .count();
    let crisis = requests
        .iter()
        .filter(|r| r.topic.as_deref() == Some(CRISIS_TOPIC))
        .count();

    let denom = total.max(1) as f64;
    HourMetrics {
        total,
        distress_pct: distress as f64 / denom * 100.0,
        high_urgency_pct: high_urgency as f64 / denom * 100.0,
        negative_pct: negative as f64 / denom * 100.0,
        crisis_pct: crisis as f64 / denom * 100.0,
        ewi: early_warning_index(distress, negative, high_urgency, total),
    }
}

/// Evaluate the ordered rule table for one region. First match wins;
/// at most one draft per region per sweep.
pub fn detect_region_anomaly(
    region: &Region,
    current: &HourMetrics,
    previous: Option<&HourMetrics>,
    top_topic: Option<String>,
) -> Option<AlertDraft> {
    // Rule 1: absolute high EWI.
    if current.ewi > HIGH_EWI_THRESHOLD {
        return Some(AlertDraft {
            region: region.code.to_string(),
            alert_type: AlertType::HighEwi,
            summary: format!(
                "مستويات التحذير المبكر مرتفعة جداً في {} ({:.0}%)",
                region.name_ar,
                current.ewi * 100.0
            ),
            z_score: z_score(current.ewi, Z_HIGH_EWI),
            related_topic: top_topic,
            time_window: Window::Last60m,
            confidence: 0.85,
            metadata: json!({
                "current_ewi": current.ewi,
                "distress_pct": current.distress_pct,
                "high_urgency_pct": current.high_urgency_pct,
                "total_requests": current.total,
                "top_phrases": [],
                "flagged_count": flagged_count(current.total, 0.4),
                "recommendations": [
                    rec(
                        RecommendationKind::Staffing,
                        format!("زيادة عدد المستشارين في {} بمقدار 2-3 أشخاص", region.name_ar),
                    ),
                    rec(
                        RecommendationKind::Routing,
                        "تحويل الحالات العاجلة مباشرة إلى المتخصصين",
                    ),
                    rec(
                        RecommendationKind::Messaging,
                        "إرسال رسائل دعم نفسي فوري للمنطقة",
                    ),
                ],
            }),
        });
    }

    // Rule 2: sharp increase against the previous hour.
    if let Some(prev) = previous.filter(|p| p.total >= MIN_SAMPLE) {
        let increase = current.ewi - prev.ewi;
        let increase_pct = increase / prev.ewi * 100.0;
        if increase_pct > SPIKE_INCREASE_PCT && current.ewi > SPIKE_EWI_FLOOR {
            return Some(AlertDraft {
                region: region.code.to_string(),
                alert_type: AlertType::EwiSpike,
                summary: format!(
                    "ارتفاع حاد في مؤشر التحذير المبكر في {} (+{:.0}%)",
                    region.name_ar, increase_pct
                ),
                z_score: z_score(increase, Z_EWI_SPIKE),
                related_topic: top_topic,
                time_window: Window::Last60m,
                confidence: 0.78,
                metadata: json!({
                    "previous_ewi": prev.ewi,
                    "current_ewi": current.ewi,
                    "increase_pct": increase_pct,
                    "distress_pct": current.distress_pct,
                    "total_requests": current.total,
                    "top_phrases": [],
                    "flagged_count": flagged_count(current.total, 0.35),
                    "recommendations": [
                        rec(
                            RecommendationKind::Staffing,
                            format!("مراجعة توزيع الموارد البشرية في {}", region.name_ar),
                        ),
                        rec(
                            RecommendationKind::Monitoring,
                            "مراقبة مستمرة للساعات القادمة",
                        ),
                    ],
                }),
            });
        }
    }

    // Rule 3: crisis-topic surge.
    if current.crisis_pct > CRISIS_SURGE_PCT {
        return Some(AlertDraft {
            region: region.code.to_string(),
            alert_type: AlertType::CrisisSurge,
            summary: format!(
                "زيادة ملحوظة في الحالات الحرجة في {} ({:.0}%)",
                region.name_ar, current.crisis_pct
            ),
            z_score: z_score(current.crisis_pct, Z_CRISIS_SURGE),
            related_topic: Some(CRISIS_TOPIC.to_string()),
            time_window: Window::Last60m,
            confidence: 0.92,
            metadata: json!({
                "crisis_pct": current.crisis_pct,
                "high_urgency_pct": current.high_urgency_pct,
                "total_requests": current.total,
                "top_phrases": [],
                "flagged_count": flagged_count(current.total, current.crisis_pct / 100.0),
                "recommendations": [
                    rec(
                        RecommendationKind::Staffing,
                        format!("تفعيل فريق الطوارئ النفسية في {} فوراً", region.name_ar),
                    ),
                    rec(
                        RecommendationKind::Routing,
                        "أولوية قصوى لجميع الحالات من هذه المنطقة",
                    ),
                    rec(
                        RecommendationKind::Escalation,
                        "إبلاغ المدير الطبي والمشرف الأول",
                    ),
                ],
            }),
        });
    }

    // Rule 4: volume spike.
    if let Some(prev) = previous {
        if current.total > prev.total * VOLUME_SPIKE_FACTOR && current.total > VOLUME_SPIKE_MIN_TOTAL
        {
            let increase_pct =
                (current.total as f64 - prev.total as f64) / prev.total as f64 * 100.0;
            return Some(AlertDraft {
                region: region.code.to_string(),
                alert_type: AlertType::VolumeSpike,
                summary: format!(
                    "ارتفاع كبير في عدد الطلبات من {} (+{:.0}%)",
                    region.name_ar, increase_pct
                ),
                z_score: z_score(
                    current.total as f64,
                    (prev.total as f64, prev.total as f64 * 0.3),
                ),
                related_topic: top_topic,
                time_window: Window::Last60m,
                confidence: 0.72,
                metadata: json!({
                    "previous_volume": prev.total,
                    "current_volume": current.total,
                    "increase_pct": increase_pct,
                    "current_ewi": current.ewi,
                    "top_phrases": [],
                    "flagged_count": flagged_count(current.total, 0.3),
                    "recommendations": [
                        rec(
                            RecommendationKind::Staffing,
                            format!("إضافة موارد بشرية لتغطية الزيادة في {}", region.name_ar),
                        ),
                        rec(
                            RecommendationKind::Operations,
                            "مراجعة أوقات الانتظار وكفاءة الخدمة",
                        ),
                    ],
                }),
            });
        }
    }

    None
}

/// Full sweep: evaluate every registered region against the current and
/// previous hour. A failing region is logged and skipped so one bad
/// region cannot abort the rest of the sweep.
pub async fn detect_anomalies(store: &dyn RequestStore, now: DateTime<Utc>) -> Vec<AlertDraft> {
    let current_start = hour_start(now);
    let previous_start = current_start - Duration::hours(1);

    let mut drafts = Vec::new();
    for region in regions::all() {
        match evaluate_region(store, region, previous_start, current_start).await {
            Ok(Some(draft)) => drafts.push(draft),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(region = region.code, error = %e, "region sweep failed; continuing");
            }
        }
    }
    drafts
}

async fn evaluate_region(
    store: &dyn RequestStore,
    region: &'static Region,
    previous_start: DateTime<Utc>,
    current_start: DateTime<Utc>,
) -> anyhow::Result<Option<AlertDraft>> {
    let current = store
        .requests_in_range(region.code, current_start, None)
        .await?;
    if current.len() < MIN_SAMPLE {
        return Ok(None);
    }
    let previous = store
        .requests_in_range(region.code, previous_start, Some(current_start))
        .await?;

    let current_metrics = compute_metrics(&current);
    // An empty previous hour gives no baseline; comparison rules skip it.
    let previous_metrics = (!previous.is_empty()).then(|| compute_metrics(&previous));
    let top_topic = most_common_topic(&current);

    Ok(detect_region_anomaly(
        region,
        &current_metrics,
        previous_metrics.as_ref(),
        top_topic,
    ))
}

/// Most frequent topic in the set; ties keep first-seen order.
fn most_common_topic(requests: &[Request]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for r in requests {
        let Some(topic) = r.topic.as_deref() else {
            continue;
        };
        match counts.iter_mut().find(|(k, _)| *k == topic) {
            Some((_, n)) => *n += 1,
            None => counts.push((topic, 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(_, n)| n)
        .map(|(k, _)| k.to_string())
}

fn z_score(value: f64, (mean, std): (f64, f64)) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    round2((value - mean) / std)
}

fn flagged_count(total: usize, fraction: f64) -> u64 {
    (total as f64 * fraction).floor() as u64
}

fn rec(kind: RecommendationKind, text: impl Into<String>) -> serde_json::Value {
    serde_json::to_value(Recommendation {
        kind,
        text: text.into(),
    })
    .unwrap_or_default()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, RequestStatus};
    use uuid::Uuid;

    fn region() -> &'static Region {
        regions::by_code("riyadh").unwrap()
    }

    fn req(emotion: Option<Emotion>, urgency: Option<Urgency>, topic: Option<&str>) -> Request {
        Request {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            channel: Channel::Call,
            region: "riyadh".to_string(),
            text_content: String::new(),
            emotion,
            topic: topic.map(|t| t.to_string()),
            urgency,
            confidence: Some(0.9),
            is_flagged: false,
            status: RequestStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
        }
    }

    fn severe(n: usize) -> Vec<Request> {
        (0..n)
            .map(|_| req(Some(Emotion::Fear), Some(Urgency::High), Some(CRISIS_TOPIC)))
            .collect()
    }

    fn quiet(n: usize) -> Vec<Request> {
        (0..n)
            .map(|_| req(Some(Emotion::Happiness), Some(Urgency::Low), None))
            .collect()
    }

    #[test]
    fn sweep_distress_includes_sadness() {
        let rs = vec![
            req(Some(Emotion::Sadness), None, None),
            req(Some(Emotion::Fear), None, None),
            req(Some(Emotion::Anger), None, None),
            req(None, None, None),
        ];
        let m = compute_metrics(&rs);
        assert!((m.distress_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn high_ewi_takes_precedence_over_crisis_surge() {
        // All-severe hour: ewi = 0.895 > 0.6 AND crisis_pct = 100 > 10.
        let current = compute_metrics(&severe(12));
        assert!(current.ewi > HIGH_EWI_THRESHOLD);
        assert!(current.crisis_pct > CRISIS_SURGE_PCT);

        let draft = detect_region_anomaly(region(), &current, None, None).unwrap();
        assert_eq!(draft.alert_type, AlertType::HighEwi);
        assert!((draft.confidence - 0.85).abs() < 1e-9);
        // z = (0.895 - 0.3) / 0.15 ≈ 3.97
        assert!((draft.z_score - 3.97).abs() < 1e-9);
    }

    #[test]
    fn ewi_spike_requires_previous_baseline() {
        // Half-severe current hour: ewi = 0.5*(0.4+0.25+0.2) + 0.045 = 0.47.
        let mut current_reqs = severe(5);
        current_reqs.extend(quiet(5));
        // Drop crisis topic so rule 3 stays silent.
        for r in &mut current_reqs {
            r.topic = None;
        }
        let current = compute_metrics(&current_reqs);
        assert!(current.ewi > SPIKE_EWI_FLOOR && current.ewi <= HIGH_EWI_THRESHOLD);

        // No previous hour: nothing fires.
        assert!(detect_region_anomaly(region(), &current, None, None).is_none());

        // Quiet previous hour with a sufficient sample: spike fires.
        let previous = compute_metrics(&quiet(10));
        let draft = detect_region_anomaly(region(), &current, Some(&previous), None).unwrap();
        assert_eq!(draft.alert_type, AlertType::EwiSpike);
        // z = (0.47 - 0.045 - 0) / 0.1 = 4.25
        assert!((draft.z_score - 4.25).abs() < 1e-9);

        // Previous hour below the sample floor is ignored.
        let thin_previous = compute_metrics(&quiet(4));
        assert!(
            detect_region_anomaly(region(), &current, Some(&thin_previous), None).is_none()
        );
    }

    #[test]
    fn crisis_surge_fires_above_10_pct() {
        let mut rs = quiet(8);
        rs.push(req(Some(Emotion::Happiness), Some(Urgency::Low), Some(CRISIS_TOPIC)));
        rs.push(req(Some(Emotion::Happiness), Some(Urgency::Low), Some(CRISIS_TOPIC)));
        let current = compute_metrics(&rs);
        assert!((current.crisis_pct - 20.0).abs() < 1e-9);
        assert!(current.ewi < SPIKE_EWI_FLOOR);

        let draft = detect_region_anomaly(region(), &current, None, None).unwrap();
        assert_eq!(draft.alert_type, AlertType::CrisisSurge);
        assert_eq!(draft.related_topic.as_deref(), Some(CRISIS_TOPIC));
        // z = (20 - 3) / 2 = 8.5
        assert!((draft.z_score - 8.5).abs() < 1e-9);
    }

    #[test]
    fn volume_spike_computes_increase_pct() {
        let current = compute_metrics(&quiet(20));
        let previous = compute_metrics(&quiet(8));
        let draft =
            detect_region_anomaly(region(), &current, Some(&previous), None).unwrap();
        assert_eq!(draft.alert_type, AlertType::VolumeSpike);
        let increase = draft.metadata["increase_pct"].as_f64().unwrap();
        assert!((increase - 150.0).abs() < 1e-9);
        // z = (20 - 8) / (8 * 0.3) = 5.0
        assert!((draft.z_score - 5.0).abs() < 1e-9);
        assert_eq!(draft.metadata["flagged_count"].as_u64(), Some(6));
    }

    #[test]
    fn doubled_but_small_volume_does_not_spike() {
        let current = compute_metrics(&quiet(9));
        let previous = compute_metrics(&quiet(4));
        assert!(detect_region_anomaly(region(), &current, Some(&previous), None).is_none());
    }

    #[test]
    fn quiet_hour_produces_no_alert() {
        let current = compute_metrics(&quiet(30));
        let previous = compute_metrics(&quiet(28));
        assert!(detect_region_anomaly(region(), &current, Some(&previous), None).is_none());
    }
}
