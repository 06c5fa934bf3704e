//! Fixed registry of monitored regions (the 13 KSA provinces).
//!
//! Region codes are the keys used on request and alert records; the
//! Arabic names feed the localized alert summaries.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub code: &'static str,
    pub name_en: &'static str,
    pub name_ar: &'static str,
}

pub static REGIONS: &[Region] = &[
    Region {
        code: "riyadh",
        name_en: "Riyadh",
        name_ar: "الرياض",
    },
    Region {
        code: "makkah",
        name_en: "Makkah",
        name_ar: "مكة المكرمة",
    },
    Region {
        code: "madinah",
        name_en: "Madinah",
        name_ar: "المدينة المنورة",
    },
    Region {
        code: "qassim",
        name_en: "Qassim",
        name_ar: "القصيم",
    },
    Region {
        code: "eastern_province",
        name_en: "Eastern Province",
        name_ar: "المنطقة الشرقية",
    },
    Region {
        code: "asir",
        name_en: "Asir",
        name_ar: "عسير",
    },
    Region {
        code: "tabuk",
        name_en: "Tabuk",
        name_ar: "تبوك",
    },
    Region {
        code: "hail",
        name_en: "Hail",
        name_ar: "حائل",
    },
    Region {
        code: "northern_borders",
        name_en: "Northern Borders",
        name_ar: "الحدود الشمالية",
    },
    Region {
        code: "jazan",
        name_en: "Jazan",
        name_ar: "جازان",
    },
    Region {
        code: "najran",
        name_en: "Najran",
        name_ar: "نجران",
    },
    Region {
        code: "al_bahah",
        name_en: "Al Bahah",
        name_ar: "الباحة",
    },
    Region {
        code: "al_jouf",
        name_en: "Al Jouf",
        name_ar: "الجوف",
    },
];

static BY_CODE: Lazy<HashMap<&'static str, &'static Region>> =
    Lazy::new(|| REGIONS.iter().map(|r| (r.code, r)).collect());

pub fn by_code(code: &str) -> Option<&'static Region> {
    BY_CODE.get(code).copied()
}

/// All regions in registry order (the sweep evaluates them in this order).
pub fn all() -> impl Iterator<Item = &'static Region> {
    REGIONS.iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_code() {
        assert_eq!(by_code("riyadh").map(|r| r.name_en), Some("Riyadh"));
        assert!(by_code("atlantis").is_none());
    }

    #[test]
    fn registry_has_thirteen_unique_codes() {
        let mut codes: Vec<_> = REGIONS.iter().map(|r| r.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 13);
    }
}
