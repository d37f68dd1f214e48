//! The `appraise validate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use appraise_core::model::Template;

fn load_template(path: &Path) -> Result<Template> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse template: {}", path.display()))
}

pub fn execute(template_path: PathBuf) -> Result<()> {
    let paths: Vec<PathBuf> = if template_path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&template_path)
            .with_context(|| format!("failed to read directory: {}", template_path.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        if files.is_empty() {
            anyhow::bail!("no .json templates in {}", template_path.display());
        }
        files
    } else {
        vec![template_path]
    };

    let mut total_problems = 0;

    for path in &paths {
        let template = load_template(path)?;
        println!(
            "Template: {} ({} indicators)",
            template.name,
            template.indicator_count()
        );

        let problems = template.validate();
        for p in &problems {
            println!("  WARNING: {p}");
        }
        total_problems += problems.len();
    }

    if total_problems == 0 {
        println!("All templates valid.");
    } else {
        println!("\n{total_problems} problem(s) found.");
    }

    Ok(())
}
