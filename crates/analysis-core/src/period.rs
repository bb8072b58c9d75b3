use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a fiscal period label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKind {
    Quarter(u8),
    Half(u8),
    FiscalYear,
    /// Label that could not be parsed; no prior periods can be derived.
    Unrecognized,
}

/// Fiscal period such as `Q3-2025`, `H1-2024` or `FY-2024`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Period {
    label: String,
    kind: PeriodKind,
    year: Option<i32>,
}

impl Period {
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_uppercase();
        let unrecognized = |label: String| Period {
            label,
            kind: PeriodKind::Unrecognized,
            year: None,
        };

        let Some((prefix, year)) = label.split_once('-') else {
            return unrecognized(label);
        };
        let Ok(year) = year.parse::<i32>() else {
            return unrecognized(label);
        };

        let kind = if prefix == "FY" {
            PeriodKind::FiscalYear
        } else if let Some(q) = prefix.strip_prefix('Q') {
            match q.parse::<u8>() {
                Ok(q) if (1..=4).contains(&q) => PeriodKind::Quarter(q),
                _ => return unrecognized(label),
            }
        } else if let Some(h) = prefix.strip_prefix('H') {
            match h.parse::<u8>() {
                Ok(h) if (1..=2).contains(&h) => PeriodKind::Half(h),
                _ => return unrecognized(label),
            }
        } else {
            return unrecognized(label);
        };

        Period {
            label,
            kind,
            year: Some(year),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    /// Same period one fiscal year earlier (`Q3-2025` -> `Q3-2024`).
    pub fn prior_year(&self) -> Option<Period> {
        let year = self.year?;
        let prefix = match self.kind {
            PeriodKind::Quarter(q) => format!("Q{q}"),
            PeriodKind::Half(h) => format!("H{h}"),
            PeriodKind::FiscalYear => "FY".to_string(),
            PeriodKind::Unrecognized => return None,
        };
        Some(Period::parse(&format!("{}-{}", prefix, year - 1)))
    }

    /// Immediately preceding quarter (`Q1-2025` -> `Q4-2024`). Only defined for quarters.
    pub fn prior_quarter(&self) -> Option<Period> {
        let year = self.year?;
        match self.kind {
            PeriodKind::Quarter(1) => Some(Period::parse(&format!("Q4-{}", year - 1))),
            PeriodKind::Quarter(q) => Some(Period::parse(&format!("Q{}-{}", q - 1, year))),
            _ => None,
        }
    }

    /// Multiplier that turns a flow metric for this period into an annual figure.
    pub fn annualization_factor(&self) -> f64 {
        match self.kind {
            PeriodKind::Quarter(_) => 4.0,
            PeriodKind::Half(_) => 2.0,
            PeriodKind::FiscalYear | PeriodKind::Unrecognized => 1.0,
        }
    }
}

impl From<String> for Period {
    fn from(label: String) -> Self {
        Period::parse(&label)
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.label
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
