//! Self-vs-supervisor delta reporting.
//!
//! Merges two instances of the same assignment (a self-evaluation and a
//! supervisor evaluation sharing one structure snapshot) into a
//! per-indicator and per-area delta report.
//!
//! Unlike the scoring engine, a missing answer here is a present-but-null
//! score, never an implied zero: "not yet rated" must not read as a
//! deliberately low rating. The two rules are intentionally separate code
//! paths.

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::instance::Instance;
use crate::model::Answer;
use crate::scoring;

/// One indicator compared across both evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDelta {
    pub indicator_id: u64,
    pub label: String,
    /// Self-evaluation score; `None` when not yet rated.
    #[serde(rename = "puntaje_auto")]
    pub auto_score: Option<i32>,
    /// Supervisor score; `None` when not yet rated.
    #[serde(rename = "puntaje_jefe")]
    pub supervisor_score: Option<i32>,
    /// `supervisor - auto`, only when both sides rated.
    pub delta: Option<i32>,
}

/// One area's percentage comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDelta {
    pub name: String,
    pub weight: u32,
    pub auto_pct: Option<f64>,
    pub supervisor_pct: Option<f64>,
    pub delta_pct: Option<f64>,
    pub indicators: Vec<IndicatorDelta>,
}

/// The full comparison of two evaluations of one assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub template_name: String,
    pub period: String,
    pub subject_name: String,
    pub areas: Vec<AreaDelta>,
    /// Overall weighted percentages, per the scoring engine.
    pub auto_overall: Option<f64>,
    pub supervisor_overall: Option<f64>,
    pub overall_delta: Option<f64>,
}

fn lookup(answers: &[Answer], indicator_id: u64) -> Option<i32> {
    answers
        .iter()
        .find(|a| a.indicator_id == indicator_id)
        .map(|a| a.score)
}

/// Compare a self-evaluation against the supervisor evaluation of the
/// same assignment.
///
/// Both instances must carry snapshots with the same indicator sequence;
/// the supervisor snapshot is the authoritative one for labels and order.
pub fn compare(auto: &Instance, supervisor: &Instance) -> Result<ComparisonReport, EvalError> {
    let auto_structure = auto.structure()?;
    let structure = supervisor.structure()?;

    let same_shape = auto_structure.indicator_count() == structure.indicator_count()
        && auto_structure
            .indicators()
            .zip(structure.indicators())
            .all(|(a, b)| a.id == b.id);
    if !same_shape {
        return Err(EvalError::SnapshotMismatch {
            auto_id: auto.id,
            supervisor_id: supervisor.id,
        });
    }

    let auto_breakdown = scoring::score_template(structure, &auto.answers);
    let supervisor_breakdown = scoring::score_template(structure, &supervisor.answers);

    let mut areas = Vec::with_capacity(structure.areas.len());
    for (idx, area) in structure.areas.iter().enumerate() {
        let indicators = area
            .competencies
            .iter()
            .flat_map(|c| &c.indicators)
            .map(|ind| {
                let auto_score = lookup(&auto.answers, ind.id);
                let supervisor_score = lookup(&supervisor.answers, ind.id);
                IndicatorDelta {
                    indicator_id: ind.id,
                    label: ind.label.clone(),
                    auto_score,
                    supervisor_score,
                    delta: supervisor_score.zip(auto_score).map(|(s, a)| s - a),
                }
            })
            .collect();

        let auto_pct = auto_breakdown.areas[idx].pct;
        let supervisor_pct = supervisor_breakdown.areas[idx].pct;
        areas.push(AreaDelta {
            name: area.name.clone(),
            weight: area.weight,
            auto_pct,
            supervisor_pct,
            delta_pct: supervisor_pct.zip(auto_pct).map(|(s, a)| s - a),
            indicators,
        });
    }

    Ok(ComparisonReport {
        template_name: structure.name.clone(),
        period: supervisor.period.clone(),
        subject_name: supervisor.subject.full_name(),
        areas,
        auto_overall: auto_breakdown.overall,
        supervisor_overall: supervisor_breakdown.overall,
        overall_delta: supervisor_breakdown
            .overall
            .zip(auto_breakdown.overall)
            .map(|(s, a)| s - a),
    })
}

impl ComparisonReport {
    /// Render the delta report as markdown.
    pub fn to_markdown(&self) -> String {
        fn score(s: Option<i32>) -> String {
            s.map_or_else(|| "—".to_string(), |v| v.to_string())
        }
        fn pct(p: Option<f64>) -> String {
            p.map_or_else(|| "—".to_string(), |v| format!("{v:.2}%"))
        }

        let mut md = String::new();
        md.push_str(&format!(
            "## {} — {} ({})\n\n",
            self.template_name, self.subject_name, self.period
        ));
        md.push_str(&format!(
            "**Overall:** self {} / supervisor {} (delta {})\n\n",
            pct(self.auto_overall),
            pct(self.supervisor_overall),
            pct(self.overall_delta),
        ));

        for area in &self.areas {
            md.push_str(&format!(
                "### {} (self {} / supervisor {})\n\n",
                area.name,
                pct(area.auto_pct),
                pct(area.supervisor_pct)
            ));
            md.push_str("| Indicator | Self | Supervisor | Delta |\n");
            md.push_str("|-----------|------|------------|-------|\n");
            for ind in &area.indicators {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    ind.label,
                    score(ind.auto_score),
                    score(ind.supervisor_score),
                    ind.delta
                        .map_or_else(|| "—".to_string(), |d| format!("{d:+}")),
                ));
            }
            md.push('\n');
        }
        md
    }

    /// Indicators where the two evaluations disagree.
    pub fn disagreements(&self) -> impl Iterator<Item = &IndicatorDelta> {
        self.areas
            .iter()
            .flat_map(|a| &a.indicators)
            .filter(|i| i.delta.is_some_and(|d| d != 0))
    }
}
