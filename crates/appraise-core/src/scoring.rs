//! Weighted achievement scoring.
//!
//! Pure, synchronous, side-effect-free; safe to re-run on every answer
//! change. The one rule worth remembering: an unanswered indicator counts
//! as zero, not as excluded, so partial completion visibly lowers the
//! running percentage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::instance::Instance;
use crate::model::{Answer, Template};

/// Per-area and overall scoring result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Weighted overall achievement percentage, rounded to 2 decimals.
    /// `None` for qualitative templates (every area weight 0).
    pub overall: Option<f64>,
    /// One entry per area, in template order.
    pub areas: Vec<AreaScore>,
    /// Raw points obtained across all areas, weighted or not.
    pub obtained_total: i32,
    /// Raw ceiling across all areas, weighted or not.
    pub max_total: i32,
}

/// Scoring detail for a single area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaScore {
    pub name: String,
    pub weight: u32,
    pub obtained: i32,
    pub ceiling: i32,
    /// `obtained / ceiling * 100`, or `None` when the area has no
    /// scoreable indicators.
    pub pct: Option<f64>,
}

/// Whether the template is purely qualitative (never graded).
pub fn is_qualitative(template: &Template) -> bool {
    template.areas.iter().all(|a| a.weight == 0)
}

/// Score an answer set against a template structure.
///
/// For every area with `weight > 0`: obtained is the sum of answered
/// scores (missing answers count as zero), the ceiling is the sum of each
/// indicator's maximum level score. Areas without indicators contribute
/// nothing even when weighted. The overall result is the weight-averaged
/// area percentage, rounded to 2 decimals, or `None` when no weighted
/// area is scoreable.
pub fn score_template(template: &Template, answers: &[Answer]) -> ScoreBreakdown {
    // Last write per indicator wins, matching the upsert rule.
    let by_indicator: HashMap<u64, i32> =
        answers.iter().map(|a| (a.indicator_id, a.score)).collect();

    let mut weighted_sum = 0.0;
    let mut weight_total = 0u32;
    let mut obtained_total = 0i32;
    let mut max_total = 0i32;
    let mut areas = Vec::with_capacity(template.areas.len());

    for area in &template.areas {
        let mut obtained = 0i32;
        let mut ceiling = 0i32;
        for comp in &area.competencies {
            for ind in &comp.indicators {
                ceiling += ind.ceiling();
                if let Some(&score) = by_indicator.get(&ind.id) {
                    obtained += score;
                }
            }
        }
        obtained_total += obtained;
        max_total += ceiling;

        let pct = (ceiling > 0).then(|| f64::from(obtained) / f64::from(ceiling) * 100.0);
        if area.weight > 0 {
            if let Some(pct) = pct {
                weighted_sum += pct * f64::from(area.weight);
                weight_total += area.weight;
            }
        }

        areas.push(AreaScore {
            name: area.name.clone(),
            weight: area.weight,
            obtained,
            ceiling,
            pct,
        });
    }

    let overall = (weight_total > 0).then(|| round2(weighted_sum / f64::from(weight_total)));

    ScoreBreakdown {
        overall,
        areas,
        obtained_total,
        max_total,
    }
}

/// Score an instance against its frozen snapshot.
///
/// Fails with [`EvalError::MissingSnapshot`] instead of silently
/// returning zero when the structure is absent.
pub fn score_instance(instance: &Instance) -> Result<ScoreBreakdown, EvalError> {
    Ok(score_template(instance.structure()?, &instance.answers))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
