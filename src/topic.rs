//! Keyword topic classification.
//!
//! Deliberately a placeholder: first keyword hit in table order wins,
//! no real NLP. The table mirrors the intake topics tracked by the
//! operations team.

/// Topic name used by the crisis-surge anomaly rule.
pub const CRISIS_TOPIC: &str = "Crisis";

const FALLBACK_TOPIC: &str = "Personal Issues";

static TOPICS: &[(&str, &[&str])] = &[
    ("Sleep Issues", &["نوم", "أرق", "منام"]),
    ("Work Stress", &["عمل", "وظيفة", "ضغط"]),
    ("Financial Stress", &["مال", "ديون", "راتب"]),
    ("Family Issues", &["عائلة", "أسرة", "أب", "أم"]),
    (CRISIS_TOPIC, &["انتحار", "إيذاء", "خطر"]),
    ("Exam Stress", &["امتحان", "اختبار", "دراسة"]),
    ("Personal Issues", &["شخصي", "نفسي"]),
];

/// Classify free text into a topic by keyword match.
pub fn predict_topic(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    for (topic, keywords) in TOPICS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return topic;
        }
    }
    FALLBACK_TOPIC
}
