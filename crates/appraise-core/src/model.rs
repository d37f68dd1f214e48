//! Core data model types for appraise.
//!
//! These are the questionnaire types the whole system builds on: a
//! [`Template`] (areas → competencies → indicators → achievement levels)
//! and the [`Answer`]s recorded against it.
//!
//! Rust field names are English; `#[serde(rename)]` preserves the wire
//! names the backend requires, so a template round-trips byte-compatible
//! with the `estructura_json` snapshots already in the database.

use serde::{Deserialize, Serialize};

/// The reusable questionnaire definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template identifier.
    #[serde(default)]
    pub id: u64,
    /// Human-readable name.
    #[serde(rename = "n_tipo_evaluacion")]
    pub name: String,
    /// Ordered list of evaluation areas.
    #[serde(default)]
    pub areas: Vec<Area>,
}

/// A scored (or purely qualitative) section of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    #[serde(default)]
    pub id: Option<u64>,
    /// Area name.
    #[serde(rename = "n_area")]
    pub name: String,
    /// Relative weight in the overall score. Zero means the area is
    /// descriptive only and never graded.
    #[serde(rename = "ponderacion", default)]
    pub weight: u32,
    #[serde(rename = "competencias", default)]
    pub competencies: Vec<Competency>,
}

/// A named group of indicators inside an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(rename = "indicadores", default)]
    pub indicators: Vec<Indicator>,
}

/// One observable behavior rated against discrete achievement levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    /// Stable identifier answers refer to.
    pub id: u64,
    /// Display ordinal within the template.
    #[serde(rename = "numero", default)]
    pub number: Option<u32>,
    /// The indicator statement shown to the rater.
    #[serde(rename = "indicador")]
    pub label: String,
    /// Optional long-form definition.
    #[serde(rename = "definicion", default)]
    pub definition: Option<String>,
    /// Rating options, ordered by rank.
    #[serde(rename = "nvlindicadores", default)]
    pub levels: Vec<AchievementLevel>,
}

/// One discrete rating option of an indicator.
///
/// Scores need not be contiguous across levels; the maximum score among
/// them is the indicator's ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementLevel {
    /// Rank 1..N within the indicator.
    #[serde(rename = "nvl", default)]
    pub rank: u32,
    /// Numeric score awarded when this level is selected.
    #[serde(rename = "puntaje")]
    pub score: i32,
    /// Short label (e.g. "Destacado").
    #[serde(rename = "nombre", default)]
    pub label: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
}

/// A recorded rating: one indicator, one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "indicador")]
    pub indicator_id: u64,
    #[serde(rename = "puntaje")]
    pub score: i32,
}

/// A reference to a person (subject or evaluator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl PersonRef {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl Indicator {
    /// Highest score among this indicator's levels, or 0 if it has none.
    pub fn ceiling(&self) -> i32 {
        self.levels.iter().map(|l| l.score).max().unwrap_or(0)
    }

    /// Whether `score` matches one of the declared achievement levels.
    pub fn has_level_score(&self, score: i32) -> bool {
        self.levels.iter().any(|l| l.score == score)
    }
}

impl Template {
    /// All indicators in document order.
    pub fn indicators(&self) -> impl Iterator<Item = &Indicator> {
        self.areas
            .iter()
            .flat_map(|a| &a.competencies)
            .flat_map(|c| &c.indicators)
    }

    /// Total number of indicators a complete evaluation must answer.
    pub fn indicator_count(&self) -> usize {
        self.indicators().count()
    }

    /// Look up an indicator by id.
    pub fn indicator(&self, id: u64) -> Option<&Indicator> {
        self.indicators().find(|i| i.id == id)
    }

    /// Whether `answer.score` matches a declared level of its indicator.
    ///
    /// The scoring engine deliberately does not enforce this (historical
    /// answers may predate level edits); callers that want strictness can
    /// check before recording.
    pub fn validate_answer(&self, answer: &Answer) -> bool {
        self.indicator(answer.indicator_id)
            .is_some_and(|i| i.has_level_score(answer.score))
    }

    /// Structural validation: non-empty names, indicators with levels.
    ///
    /// Returns every problem found, with a human-readable location.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("template name is empty".to_string());
        }
        for (ai, area) in self.areas.iter().enumerate() {
            if area.name.trim().is_empty() {
                problems.push(format!("area {} has an empty name", ai + 1));
            }
            for (ci, comp) in area.competencies.iter().enumerate() {
                if comp.name.trim().is_empty() {
                    problems.push(format!(
                        "competency {} in area {} has an empty name",
                        ci + 1,
                        ai + 1
                    ));
                }
                for (ii, ind) in comp.indicators.iter().enumerate() {
                    if ind.label.trim().is_empty() {
                        problems.push(format!(
                            "indicator {} in competency {}, area {} has no text",
                            ii + 1,
                            ci + 1,
                            ai + 1
                        ));
                    }
                    if area.weight > 0 && ind.levels.is_empty() {
                        problems.push(format!(
                            "indicator {} in competency {}, area {} is scored but has no levels",
                            ii + 1,
                            ci + 1,
                            ai + 1
                        ));
                    }
                }
            }
        }
        problems
    }

    /// Return a copy with one area replaced. Template values are
    /// immutable by convention; editors thread updated copies instead of
    /// mutating a shared document.
    pub fn with_area(&self, index: usize, area: Area) -> Template {
        let mut next = self.clone();
        if index < next.areas.len() {
            next.areas[index] = area;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(rank: u32, score: i32) -> AchievementLevel {
        AchievementLevel {
            rank,
            score,
            label: format!("level {rank}"),
            description: String::new(),
        }
    }

    fn indicator(id: u64, scores: &[i32]) -> Indicator {
        Indicator {
            id,
            number: None,
            label: format!("indicator {id}"),
            definition: None,
            levels: scores
                .iter()
                .enumerate()
                .map(|(i, &s)| level(i as u32 + 1, s))
                .collect(),
        }
    }

    #[test]
    fn ceiling_is_max_level_score_even_when_noncontiguous() {
        let ind = indicator(1, &[1, 2, 5]);
        assert_eq!(ind.ceiling(), 5);
        assert_eq!(indicator(2, &[]).ceiling(), 0);
    }

    #[test]
    fn wire_names_round_trip() {
        let template = Template {
            id: 7,
            name: "Desempeño Anual".into(),
            areas: vec![Area {
                id: Some(1),
                name: "Liderazgo".into(),
                weight: 60,
                competencies: vec![Competency {
                    id: Some(2),
                    name: "Comunicación".into(),
                    indicators: vec![indicator(10, &[1, 2, 3, 4])],
                }],
            }],
        };

        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["n_tipo_evaluacion"], "Desempeño Anual");
        assert_eq!(json["areas"][0]["n_area"], "Liderazgo");
        assert_eq!(json["areas"][0]["ponderacion"], 60);
        let ind = &json["areas"][0]["competencias"][0]["indicadores"][0];
        assert_eq!(ind["indicador"], "indicator 10");
        assert_eq!(ind["nvlindicadores"][3]["puntaje"], 4);

        let back: Template = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);
    }

    #[test]
    fn answer_wire_names() {
        let json = serde_json::to_value(Answer {
            indicator_id: 42,
            score: 3,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"indicador": 42, "puntaje": 3}));
    }

    #[test]
    fn validate_reports_all_problems() {
        let template = Template {
            id: 1,
            name: "  ".into(),
            areas: vec![Area {
                id: None,
                name: String::new(),
                weight: 50,
                competencies: vec![Competency {
                    id: None,
                    name: "ok".into(),
                    indicators: vec![indicator(1, &[])],
                }],
            }],
        };
        let problems = template.validate();
        assert_eq!(problems.len(), 3, "{problems:?}");
    }

    #[test]
    fn validate_answer_against_levels() {
        let template = Template {
            id: 1,
            name: "t".into(),
            areas: vec![Area {
                id: None,
                name: "a".into(),
                weight: 100,
                competencies: vec![Competency {
                    id: None,
                    name: "c".into(),
                    indicators: vec![indicator(1, &[1, 2, 4])],
                }],
            }],
        };
        assert!(template.validate_answer(&Answer {
            indicator_id: 1,
            score: 4
        }));
        assert!(!template.validate_answer(&Answer {
            indicator_id: 1,
            score: 3
        }));
        assert!(!template.validate_answer(&Answer {
            indicator_id: 99,
            score: 1
        }));
    }

    #[test]
    fn with_area_leaves_original_untouched() {
        let template = Template {
            id: 1,
            name: "t".into(),
            areas: vec![Area {
                id: None,
                name: "before".into(),
                weight: 10,
                competencies: vec![],
            }],
        };
        let edited = template.with_area(
            0,
            Area {
                id: None,
                name: "after".into(),
                weight: 10,
                competencies: vec![],
            },
        );
        assert_eq!(template.areas[0].name, "before");
        assert_eq!(edited.areas[0].name, "after");
    }
}
