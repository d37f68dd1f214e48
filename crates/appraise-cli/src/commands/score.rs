//! The `appraise score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use appraise_core::instance::Instance;
use appraise_core::lifecycle::derive_state;
use appraise_core::scoring::score_instance;

pub fn execute(instance_path: PathBuf, format: String) -> Result<()> {
    let content = std::fs::read_to_string(&instance_path)
        .with_context(|| format!("failed to read instance: {}", instance_path.display()))?;
    let instance: Instance = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse instance: {}", instance_path.display()))?;

    let breakdown = score_instance(&instance)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!(
        "Evaluation {} — {} ({})",
        instance.id,
        instance.subject.full_name(),
        instance.period
    );
    println!("State: {}", derive_state(&instance));

    let mut table = Table::new();
    table.set_header(vec!["Area", "Weight", "Obtained", "Ceiling", "Achievement"]);
    for area in &breakdown.areas {
        table.add_row(vec![
            Cell::new(&area.name),
            Cell::new(format!("{}%", area.weight)),
            Cell::new(area.obtained),
            Cell::new(area.ceiling),
            Cell::new(
                area.pct
                    .map(|p| format!("{p:.2}%"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    println!("{table}");

    match breakdown.overall {
        Some(overall) => println!(
            "Overall: {overall:.2}%  ({}/{} points)",
            breakdown.obtained_total, breakdown.max_total
        ),
        None => println!("Overall: qualitative evaluation, no numeric achievement"),
    }

    Ok(())
}
