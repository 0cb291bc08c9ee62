//! Label normalization for status and blame text.
//!
//! Both normalizers are total: every input (including empty text and the `none`/`nan`
//! placeholders spreadsheets leave behind) maps to exactly one label. Matching is driven by
//! ordered rule tables; the first rule that matches wins.
//!
//! Space stripping removes every Unicode whitespace character (tabs and no-break spaces
//! included), not only ASCII spaces.

use serde::{Serialize, Serializer};
use std::fmt;

/// How a rule inspects the cleaned text.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Cleaned text equals one of the variants.
    Exact(&'static [&'static str]),
    /// Cleaned text contains one of the keywords.
    Contains(&'static [&'static str]),
}

impl Matcher {
    pub fn matches(&self, cleaned: &str) -> bool {
        match self {
            Matcher::Exact(variants) => variants.iter().any(|v| *v == cleaned),
            Matcher::Contains(keywords) => keywords.iter().any(|k| cleaned.contains(k)),
        }
    }
}

/// One entry of an ordered rule table.
#[derive(Debug, Clone, Copy)]
pub struct Rule<L: 'static> {
    pub matcher: Matcher,
    pub label: L,
}

fn first_match<L: Copy>(rules: &[Rule<L>], cleaned: &str) -> Option<L> {
    rules
        .iter()
        .find(|rule| rule.matcher.matches(cleaned))
        .map(|rule| rule.label)
}

fn strip_spaces(raw: &str) -> String {
    raw.trim().chars().filter(|c| !c.is_whitespace()).collect()
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusKind {
    CrossMisallocation,
    ProductionMissing,
    DeliveryMissing,
}

impl StatusKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatusKind::CrossMisallocation => "교차 오배분",
            StatusKind::ProductionMissing => "생산누락",
            StatusKind::DeliveryMissing => "배송누락",
        }
    }
}

pub const STATUS_RULES: &[Rule<StatusKind>] = &[
    Rule {
        matcher: Matcher::Exact(&["교차오배분", "교차오배분건", "교차", "오배분"]),
        label: StatusKind::CrossMisallocation,
    },
    Rule {
        matcher: Matcher::Contains(&["생산누락"]),
        label: StatusKind::ProductionMissing,
    },
    Rule {
        matcher: Matcher::Contains(&["배송누락"]),
        label: StatusKind::DeliveryMissing,
    },
];

/// Normalized status. Unknown statuses are kept verbatim (trimmed) so new
/// categories show up in summaries instead of disappearing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusLabel {
    Known(StatusKind),
    Other(String),
}

impl StatusLabel {
    pub fn known(kind: StatusKind) -> Self {
        StatusLabel::Known(kind)
    }

    /// Normalize free status text.
    pub fn normalize(raw: &str) -> Self {
        let cleaned = strip_spaces(raw);
        match first_match(STATUS_RULES, &cleaned) {
            Some(kind) => StatusLabel::known(kind),
            None => StatusLabel::Other(raw.trim().to_string()),
        }
    }

    pub fn kind(&self) -> Option<StatusKind> {
        match self {
            StatusLabel::Known(kind) => Some(*kind),
            StatusLabel::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StatusLabel::Known(kind) => kind.label(),
            StatusLabel::Other(text) => text,
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StatusLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Blame
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlameKind {
    OfFault,
    SystemError,
    DeliveryFault,
    CcTeamFault,
    VendorFault,
    Unconfirmed,
    CustomerFault,
    Unclassified,
}

impl BlameKind {
    pub const ALL: [BlameKind; 8] = [
        BlameKind::OfFault,
        BlameKind::SystemError,
        BlameKind::DeliveryFault,
        BlameKind::CcTeamFault,
        BlameKind::VendorFault,
        BlameKind::Unconfirmed,
        BlameKind::CustomerFault,
        BlameKind::Unclassified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BlameKind::OfFault => "OF귀책",
            BlameKind::SystemError => "시스템오류",
            BlameKind::DeliveryFault => "배송귀책",
            BlameKind::CcTeamFault => "CC팀귀책",
            BlameKind::VendorFault => "공급사귀책",
            BlameKind::Unconfirmed => "확인불가",
            BlameKind::CustomerFault => "고객귀책",
            BlameKind::Unclassified => "미분류",
        }
    }

    fn from_label(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == text)
    }
}

/// Blame rules in priority order. Keywords are matched against lower-cased,
/// space-free text.
pub const BLAME_RULES: &[Rule<BlameKind>] = &[
    Rule {
        matcher: Matcher::Contains(&["of", "of귀책", "of책임"]),
        label: BlameKind::OfFault,
    },
    Rule {
        matcher: Matcher::Contains(&["시스템", "system", "시스템오류"]),
        label: BlameKind::SystemError,
    },
    Rule {
        matcher: Matcher::Contains(&["배송", "배송귀책", "delivery"]),
        label: BlameKind::DeliveryFault,
    },
    Rule {
        matcher: Matcher::Contains(&["cc", "cc팀", "cc팀귀책"]),
        label: BlameKind::CcTeamFault,
    },
    Rule {
        matcher: Matcher::Contains(&["공급사", "vendor", "공급사귀책"]),
        label: BlameKind::VendorFault,
    },
    Rule {
        matcher: Matcher::Contains(&["확인불가", "불명", "미확인"]),
        label: BlameKind::Unconfirmed,
    },
    Rule {
        matcher: Matcher::Contains(&["고객", "고객귀책"]),
        label: BlameKind::CustomerFault,
    },
];

const BLANK_PLACEHOLDERS: &[&str] = &["", "none", "nan"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlameLabel {
    Known(BlameKind),
    Other(String),
}

impl BlameLabel {
    /// Normalize free blame text.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(kind) = BlameKind::from_label(trimmed) {
            return BlameLabel::Known(kind);
        }

        let cleaned = strip_spaces(&trimmed.to_lowercase());
        if BLANK_PLACEHOLDERS.contains(&cleaned.as_str()) {
            return BlameLabel::Known(BlameKind::Unclassified);
        }

        match first_match(BLAME_RULES, &cleaned) {
            Some(kind) => BlameLabel::Known(kind),
            None => BlameLabel::Other(trimmed.to_string()),
        }
    }

    pub fn kind(&self) -> Option<BlameKind> {
        match self {
            BlameLabel::Known(kind) => Some(*kind),
            BlameLabel::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BlameLabel::Known(kind) => kind.label(),
            BlameLabel::Other(text) => text,
        }
    }
}

impl From<BlameKind> for BlameLabel {
    fn from(kind: BlameKind) -> Self {
        BlameLabel::Known(kind)
    }
}

impl fmt::Display for BlameLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BlameLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
