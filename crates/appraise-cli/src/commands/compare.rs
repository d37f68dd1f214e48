//! The `appraise compare` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use appraise_core::comparison::compare;
use appraise_core::instance::Instance;

fn load_instance(path: &Path) -> Result<Instance> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read instance: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse instance: {}", path.display()))
}

pub fn execute(auto_path: PathBuf, supervisor_path: PathBuf, format: String) -> Result<()> {
    let auto = load_instance(&auto_path)?;
    let supervisor = load_instance(&supervisor_path)?;

    let report = compare(&auto, &supervisor)?;

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            // text format
            println!(
                "Comparison: {} — {} ({})",
                report.template_name, report.subject_name, report.period
            );
            for area in &report.areas {
                println!(
                    "\n{} (weight {}%): self {} vs supervisor {}",
                    area.name,
                    area.weight,
                    fmt_pct(area.auto_pct),
                    fmt_pct(area.supervisor_pct)
                );
                for ind in &area.indicators {
                    println!(
                        "  {} self {} / supervisor {} / delta {}",
                        ind.label,
                        fmt_score(ind.auto_score),
                        fmt_score(ind.supervisor_score),
                        ind.delta
                            .map(|d| format!("{d:+}"))
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }

            println!(
                "\nOverall: self {} vs supervisor {}",
                fmt_pct(report.auto_overall),
                fmt_pct(report.supervisor_overall)
            );
            if let Some(delta) = report.overall_delta {
                println!("Overall delta: {delta:+.2}%");
            }

            let disagreements = report.disagreements().count();
            if disagreements > 0 {
                println!("{disagreements} indicator(s) scored differently");
            }
        }
    }

    Ok(())
}

fn fmt_pct(value: Option<f64>) -> String {
    value
        .map(|p| format!("{p:.2}%"))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_score(value: Option<i32>) -> String {
    value
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string())
}
