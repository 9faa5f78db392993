use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Tunables for structural inference, extraction, matching and drill-down.
///
/// Every section and field is optional; an empty document yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default)]
    pub structure: StructureConfig,
    #[serde(default)]
    pub periods: PeriodConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub drill_down: DrillDownConfig,
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructureConfig {
    /// Rows scanned from the top for the header row and for periods.
    pub header_scan_rows: usize,
    /// Period-like cells (excluding column A) a row needs to be the header.
    pub min_header_period_cells: usize,
    /// Leading columns searched for a line-item label.
    pub label_scan_columns: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: 10,
            min_header_period_cells: 3,
            label_scan_columns: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeriodConfig {
    /// Below this many recognized periods, template synthesis runs.
    pub template_threshold: usize,
    /// First year of template expansion.
    pub year_start: i32,
    /// Last year of template expansion (inclusive).
    pub year_end: i32,
    /// A cell that is only a 4-digit year must fall in this window.
    pub min_plausible_year: i32,
    pub max_plausible_year: i32,
    /// Explicit template patterns such as `"FY{Q}Q{YY}[E]"`. When set,
    /// these replace templates reverse-engineered from observed periods.
    pub templates: Vec<String>,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            template_threshold: 70,
            year_start: 1990,
            year_end: 2030,
            min_plausible_year: 1990,
            max_plausible_year: 2050,
            templates: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction + Matching + Drill-down
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Magnitudes at or below this are treated as zero.
    pub value_epsilon: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self { value_epsilon: 0.001 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Minimum normalized similarity (0..=1) for a fuzzy label match.
    pub similarity_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { similarity_threshold: 0.85 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrillDownConfig {
    /// Depth budget for dependency trees. The root is depth 0.
    pub max_depth: usize,
}

impl Default for DrillDownConfig {
    fn default() -> Self {
        Self { max_depth: 2 }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.structure.header_scan_rows == 0 {
            return Err(ReconError::ConfigValidation(
                "structure.header_scan_rows must be at least 1".into(),
            ));
        }
        if self.structure.min_header_period_cells == 0 {
            return Err(ReconError::ConfigValidation(
                "structure.min_header_period_cells must be at least 1".into(),
            ));
        }
        if self.structure.label_scan_columns == 0 {
            return Err(ReconError::ConfigValidation(
                "structure.label_scan_columns must be at least 1".into(),
            ));
        }
        if self.periods.year_start > self.periods.year_end {
            return Err(ReconError::ConfigValidation(format!(
                "periods.year_start ({}) is after periods.year_end ({})",
                self.periods.year_start, self.periods.year_end
            )));
        }
        if self.periods.min_plausible_year > self.periods.max_plausible_year {
            return Err(ReconError::ConfigValidation(format!(
                "periods.min_plausible_year ({}) is after periods.max_plausible_year ({})",
                self.periods.min_plausible_year, self.periods.max_plausible_year
            )));
        }
        for pattern in &self.periods.templates {
            if crate::template::PeriodTemplate::from_pattern(pattern).is_none() {
                return Err(ReconError::ConfigValidation(format!(
                    "periods.templates: '{pattern}' has no placeholder"
                )));
            }
        }
        let t = self.matching.similarity_threshold;
        if t.is_nan() || t <= 0.0 || t > 1.0 {
            return Err(ReconError::ConfigValidation(format!(
                "matching.similarity_threshold must be in (0, 1], got {t}"
            )));
        }
        let eps = self.extract.value_epsilon;
        if eps.is_nan() || eps < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "extract.value_epsilon must be non-negative, got {eps}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
