//! The `masterytrace params` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use masterytrace_core::config::load_config_from;
use masterytrace_core::parser::parse_catalog;

pub fn execute(catalog_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let catalog = parse_catalog(&catalog_path)?;

    if catalog.skills.is_empty() {
        println!("Catalog {} defines no skills.", catalog.id);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Skill",
        "Name",
        "p_transit",
        "p_slip",
        "p_guess",
        "Source",
        "Prerequisites",
    ]);

    for skill in &catalog.skills {
        let params = catalog.effective_params(&skill.id, &config.defaults);
        let source = if !skill.params.is_empty() {
            "skill"
        } else if !catalog.defaults.is_empty() {
            "catalog"
        } else {
            "config"
        };
        let prerequisites = skill
            .prerequisites
            .iter()
            .map(|p| {
                if p.weight == 1.0 {
                    p.skill_id.clone()
                } else {
                    format!("{} ({:.2})", p.skill_id, p.weight)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(&skill.id),
            Cell::new(&skill.name),
            Cell::new(format!("{:.3}", params.p_transit)),
            Cell::new(format!("{:.3}", params.p_slip)),
            Cell::new(format!("{:.3}", params.p_guess)),
            Cell::new(source),
            Cell::new(prerequisites),
        ]);
    }

    println!("{table}");
    Ok(())
}
