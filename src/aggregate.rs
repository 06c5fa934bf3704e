//! # Aggregation Engine
//! Pure functions that turn a pre-filtered set of labeled requests into a
//! per-region statistical summary: counts, sentiment and emotion mixes,
//! top topics, the Early Warning Index, and inline anomaly flags.
//!
//! Callers filter by time window, region, and channel *before* calling in;
//! the engine only echoes the window and region labels into the result.
//! An empty input set is valid and yields all-zero percentages.

use serde::Serialize;

use crate::model::{Channel, EmotionCategory, Request, Sentiment, Urgency};
use crate::window::Window;

/// Sentinel region code meaning "all regions combined".
pub const ALL_REGIONS: &str = "all";

/// How many topics the summary carries.
const TOP_TOPICS: usize = 5;

// Inline anomaly thresholds and assumed (mean, std) baselines per metric.
// Heuristic placeholders pending calibration against real history; the
// z-scores are fixed linear standardizations, not rolling statistics.
const DISTRESS_THRESHOLD_PCT: f64 = 40.0;
const DISTRESS_BASELINE: (f64, f64) = (20.0, 10.0);
const NEGATIVE_THRESHOLD_PCT: f64 = 50.0;
const NEGATIVE_BASELINE: (f64, f64) = (30.0, 10.0);
const URGENCY_THRESHOLD_PCT: f64 = 30.0;
const URGENCY_BASELINE: (f64, f64) = (15.0, 8.0);

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Counts {
    pub events: usize,
    pub calls: usize,
    pub chats: usize,
    pub surveys: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SentimentPct {
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EmotionsPct {
    pub distress: f64,
    pub anger: f64,
    pub sadness: f64,
    pub calm: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicShare {
    pub key: String,
    pub pct: f64,
}

/// Inline, recomputed-per-call anomaly flag. Distinct from persisted
/// alerts: these exist only inside a `RegionAggregate` response.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyFlag {
    pub metric: &'static str,
    pub z: f64,
}

/// Ephemeral per-region summary; computed on demand, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RegionAggregate {
    pub window: Window,
    pub region: String,
    pub counts: Counts,
    pub sentiment_pct: SentimentPct,
    pub emotions_pct: EmotionsPct,
    pub top_topics: Vec<TopicShare>,
    pub ewi: f64,
    pub anomalies: Vec<AnomalyFlag>,
}

/// Canonical Early Warning Index over raw counts, as a fraction in [0, 1].
///
/// Weighted blend of distress share, negative-sentiment share, and
/// high-urgency share, plus a fixed `0.15 * 0.3` operations-complaints
/// baseline (a signal we do not yet measure; it always contributes 0.045).
/// Clamped to 1.0 so extreme inputs cannot push the index past full scale.
pub fn early_warning_index(
    distress: usize,
    negative: usize,
    high_urgency: usize,
    total: usize,
) -> f64 {
    let denom = total.max(1) as f64;
    let raw = (distress as f64 / denom) * 0.4
        + (negative as f64 / denom) * 0.25
        + (high_urgency as f64 / denom) * 0.2
        + 0.15 * 0.3;
    raw.min(1.0)
}

/// Compute the full aggregate for one request set.
///
/// `region` is informational only (echoed into the result); pass `None`
/// for the all-regions sentinel.
pub fn compute_aggregate(
    region: Option<&str>,
    requests: &[Request],
    window: Window,
) -> RegionAggregate {
    let counts = Counts {
        events: requests.len(),
        calls: requests.iter().filter(|r| r.channel == Channel::Call).count(),
        chats: requests.iter().filter(|r| r.channel == Channel::Chat).count(),
        surveys: requests
            .iter()
            .filter(|r| r.channel == Channel::Survey)
            .count(),
    };

    // Sentiment mix. Sentiment is derived per request, so every event
    // lands in exactly one of the three buckets.
    let mut pos = 0usize;
    let mut neu = 0usize;
    let mut neg = 0usize;
    for r in requests {
        match r.sentiment() {
            Sentiment::Positive => pos += 1,
            Sentiment::Neutral => neu += 1,
            Sentiment::Negative => neg += 1,
        }
    }
    let sentiment_denom = (pos + neu + neg).max(1) as f64;
    let sentiment_pct = SentimentPct {
        pos: pos as f64 / sentiment_denom * 100.0,
        neu: neu as f64 / sentiment_denom * 100.0,
        neg: neg as f64 / sentiment_denom * 100.0,
    };

    // Emotion mix over the four dashboard buckets; unclassified → calm.
    let mut distress = 0usize;
    let mut anger = 0usize;
    let mut sadness = 0usize;
    let mut calm = 0usize;
    for r in requests {
        match r.emotion_category() {
            EmotionCategory::Distress => distress += 1,
            EmotionCategory::Anger => anger += 1,
            EmotionCategory::Sadness => sadness += 1,
            EmotionCategory::Calm => calm += 1,
        }
    }
    let emotion_denom = (distress + anger + sadness + calm).max(1) as f64;
    let emotions_pct = EmotionsPct {
        distress: distress as f64 / emotion_denom * 100.0,
        anger: anger as f64 / emotion_denom * 100.0,
        sadness: sadness as f64 / emotion_denom * 100.0,
        calm: calm as f64 / emotion_denom * 100.0,
    };

    let top_topics = top_topics(requests, counts.events);

    let high_urgency = requests
        .iter()
        .filter(|r| r.urgency == Some(Urgency::High))
        .count();
    let high_urgency_rate = high_urgency as f64 / counts.events.max(1) as f64 * 100.0;

    let ewi = early_warning_index(distress, neg, high_urgency, counts.events);

    let mut anomalies = Vec::new();
    if emotions_pct.distress > DISTRESS_THRESHOLD_PCT {
        anomalies.push(AnomalyFlag {
            metric: "distress",
            z: round1(standardize(emotions_pct.distress, DISTRESS_BASELINE)),
        });
    }
    if sentiment_pct.neg > NEGATIVE_THRESHOLD_PCT {
        anomalies.push(AnomalyFlag {
            metric: "negative_sentiment",
            z: round1(standardize(sentiment_pct.neg, NEGATIVE_BASELINE)),
        });
    }
    if high_urgency_rate > URGENCY_THRESHOLD_PCT {
        anomalies.push(AnomalyFlag {
            metric: "high_urgency_rate",
            z: round1(standardize(high_urgency_rate, URGENCY_BASELINE)),
        });
    }

    RegionAggregate {
        window,
        region: region.unwrap_or(ALL_REGIONS).to_string(),
        counts,
        sentiment_pct,
        emotions_pct,
        top_topics,
        ewi,
        anomalies,
    }
}

/// Topic frequency as a share of all events, descending; ties keep
/// first-seen order (the sort is stable over insertion order).
fn top_topics(requests: &[Request], events: usize) -> Vec<TopicShare> {
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
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(TOP_TOPICS)
        .map(|(key, n)| TopicShare {
            key: key.to_string(),
            pct: n as f64 / events.max(1) as f64 * 100.0,
        })
        .collect()
}

/// Group requests by region code, preserving first-seen region order.
pub fn group_by_region(requests: Vec<Request>) -> Vec<(String, Vec<Request>)> {
    let mut groups: Vec<(String, Vec<Request>)> = Vec::new();
    for r in requests {
        match groups.iter_mut().find(|(code, _)| *code == r.region) {
            Some((_, bucket)) => bucket.push(r),
            None => groups.push((r.region.clone(), vec![r])),
        }
    }
    groups
}

fn standardize(value: f64, (mean, std): (f64, f64)) -> f64 {
    (value - mean) / std
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Emotion, RequestStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn req(
        channel: Channel,
        emotion: Option<Emotion>,
        urgency: Option<Urgency>,
        topic: Option<&str>,
    ) -> Request {
        Request {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            channel,
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

    #[test]
    fn empty_set_yields_zero_percentages() {
        let agg = compute_aggregate(Some("riyadh"), &[], Window::Last60m);
        assert_eq!(agg.counts.events, 0);
        assert_eq!(agg.sentiment_pct.pos, 0.0);
        assert_eq!(agg.sentiment_pct.neu, 0.0);
        assert_eq!(agg.sentiment_pct.neg, 0.0);
        assert_eq!(agg.emotions_pct.calm, 0.0);
        assert!(agg.top_topics.is_empty());
        assert!(agg.anomalies.is_empty());
        // Only the fixed ops-complaints baseline remains.
        assert!((agg.ewi - 0.045).abs() < 1e-9);
    }

    #[test]
    fn sentiment_percentages_sum_to_100() {
        let rs = vec![
            req(Channel::Call, Some(Emotion::Happiness), None, None),
            req(Channel::Chat, Some(Emotion::Fear), None, None),
            req(Channel::Survey, None, None, None),
            req(Channel::Call, Some(Emotion::Sadness), None, None),
            req(Channel::Call, Some(Emotion::Confusion), None, None),
        ];
        let agg = compute_aggregate(Some("riyadh"), &rs, Window::Last60m);
        let sum = agg.sentiment_pct.pos + agg.sentiment_pct.neu + agg.sentiment_pct.neg;
        assert!((sum - 100.0).abs() < 1e-9);
        let esum = agg.emotions_pct.distress
            + agg.emotions_pct.anger
            + agg.emotions_pct.sadness
            + agg.emotions_pct.calm;
        assert!((esum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn channel_counts_partition_events() {
        let rs = vec![
            req(Channel::Call, None, None, None),
            req(Channel::Call, None, None, None),
            req(Channel::Chat, None, None, None),
            req(Channel::Survey, None, None, None),
        ];
        let agg = compute_aggregate(None, &rs, Window::Today);
        assert_eq!(agg.region, ALL_REGIONS);
        assert_eq!(agg.counts.events, 4);
        assert_eq!(
            (agg.counts.calls, agg.counts.chats, agg.counts.surveys),
            (2, 1, 1)
        );
    }

    #[test]
    fn top_topics_capped_and_sorted_descending() {
        let mut rs = Vec::new();
        for (topic, n) in [
            ("Sleep Issues", 1),
            ("Work Stress", 4),
            ("Financial Stress", 2),
            ("Family Issues", 3),
            ("Crisis", 2),
            ("Exam Stress", 1),
        ] {
            for _ in 0..n {
                rs.push(req(Channel::Call, None, None, Some(topic)));
            }
        }
        let agg = compute_aggregate(Some("riyadh"), &rs, Window::Last24h);
        assert_eq!(agg.top_topics.len(), 5);
        assert_eq!(agg.top_topics[0].key, "Work Stress");
        for pair in agg.top_topics.windows(2) {
            assert!(pair[0].pct >= pair[1].pct);
        }
        // Tie at 2: Financial Stress was seen before Crisis.
        assert_eq!(agg.top_topics[2].key, "Financial Stress");
        assert_eq!(agg.top_topics[3].key, "Crisis");
    }

    #[test]
    fn ewi_is_deterministic() {
        let rs = vec![
            req(Channel::Call, Some(Emotion::Fear), Some(Urgency::High), None),
            req(Channel::Chat, Some(Emotion::Happiness), Some(Urgency::Low), None),
        ];
        let a = compute_aggregate(Some("riyadh"), &rs, Window::Last60m).ewi;
        let b = compute_aggregate(Some("riyadh"), &rs, Window::Last60m).ewi;
        assert_eq!(a, b);
    }

    #[test]
    fn distress_flag_is_strictly_above_40() {
        // 4/10 fear → exactly 40%: no flag. 3 high urgency → exactly 30%: no flag.
        let mut rs = Vec::new();
        for i in 0..10 {
            let emotion = if i < 4 { Some(Emotion::Fear) } else { None };
            let urgency = if i < 3 { Some(Urgency::High) } else { None };
            rs.push(req(Channel::Call, emotion, urgency, None));
        }
        let agg = compute_aggregate(Some("riyadh"), &rs, Window::Last60m);
        assert!((agg.emotions_pct.distress - 40.0).abs() < 1e-9);
        assert!(agg.anomalies.is_empty());

        // 5/10 fear → 50%: distress flag fires with z = (50-20)/10 = 3.0.
        let mut rs = Vec::new();
        for i in 0..10 {
            let emotion = if i < 5 { Some(Emotion::Fear) } else { None };
            rs.push(req(Channel::Call, emotion, None, None));
        }
        let agg = compute_aggregate(Some("riyadh"), &rs, Window::Last60m);
        let distress = agg
            .anomalies
            .iter()
            .find(|a| a.metric == "distress")
            .expect("distress flag at 50%");
        assert!((distress.z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn ewi_stays_within_unit_interval_on_extreme_input() {
        // Every request simultaneously distressed, negative, and high urgency.
        let rs: Vec<_> = (0..20)
            .map(|_| req(Channel::Call, Some(Emotion::Fear), Some(Urgency::High), None))
            .collect();
        let agg = compute_aggregate(Some("riyadh"), &rs, Window::Last60m);
        assert!(agg.ewi <= 1.0);
        assert!((agg.ewi - 0.895).abs() < 1e-9);
    }

    #[test]
    fn group_by_region_preserves_first_seen_order() {
        let mut a = req(Channel::Call, None, None, None);
        a.region = "tabuk".into();
        let mut b = req(Channel::Call, None, None, None);
        b.region = "riyadh".into();
        let mut c = req(Channel::Call, None, None, None);
        c.region = "tabuk".into();
        let groups = group_by_region(vec![a, b, c]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "tabuk");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "riyadh");
    }
}
