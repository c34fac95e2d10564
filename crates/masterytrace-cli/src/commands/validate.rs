//! The `masterytrace validate` command.

use std::path::PathBuf;

use anyhow::Result;

use masterytrace_core::config::load_config_from;
use masterytrace_core::parser;

pub fn execute(catalog_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let catalogs = parser::load_catalogs(&catalog_path)?;

    let mut total_warnings = 0;

    for catalog in &catalogs {
        println!(
            "Catalog: {} ({} skills, {} quizzes)",
            catalog.name,
            catalog.skills.len(),
            catalog.quizzes.len()
        );

        let warnings = parser::validate_catalog(catalog, &config.defaults, &config.short_answer);
        for w in &warnings {
            let prefix = w
                .quiz_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
