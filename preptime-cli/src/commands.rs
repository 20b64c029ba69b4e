//! Subcommand handlers.

use crate::{ConfigAction, Variant};
use anyhow::Context;
use preptime_ml::{Dataset, OrderRecord, OutlierFilter, PipelineConfig, PrepTimePipeline, load_config};
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn handle_run(
    workspace: &Path,
    config_path: Option<&Path>,
    data: &Path,
    variant: Option<Variant>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(variant) = variant {
        config.filter = apply_variant(&config.filter, variant);
    }

    let orders = read_orders(data)?;
    tracing::info!(path = %data.display(), orders = orders.len(), "Loaded orders");
    let dataset = Dataset::from_orders(orders).context("Invalid order table")?;

    let pipeline = PrepTimePipeline::new(config)?;
    let run = pipeline.run(&dataset).context("Pipeline run failed")?;

    println!("{}", run.report);
    println!(
        "Selected: {} ({:?}; lowest cross-validated error: {})",
        run.selection.chosen, run.selection.reason, run.selection.lowest_error
    );
    for check in run.selection.overfitting.iter().filter(|c| c.flagged) {
        println!(
            "Overfit: {} (train {:.4}, holdout {:.4}, gap {:.1}%)",
            check.model,
            check.train_rmse,
            check.holdout_rmse,
            check.relative_gap * 100.0
        );
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&run)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to: {}", path.display());
    }
    Ok(())
}

pub fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".preptime");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!("Configuration already exists at: {}", config_path.display());
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&PipelineConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!("Created default configuration at: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Swap the filter variant, keeping configured cutoffs when the variant is unchanged.
fn apply_variant(current: &OutlierFilter, variant: Variant) -> OutlierFilter {
    match (variant, current) {
        (Variant::None, _) => OutlierFilter::None,
        (Variant::SameDay, OutlierFilter::SameDay { .. }) => current.clone(),
        (Variant::SameDay, _) => OutlierFilter::same_day(),
        (Variant::Asap, OutlierFilter::Asap { .. }) => current.clone(),
        (Variant::Asap, _) => OutlierFilter::asap(),
    }
}

/// Read a JSON-lines order table. Blank lines are skipped.
fn read_orders(path: &Path) -> anyhow::Result<Vec<OrderRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut orders = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let order: OrderRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed order", path.display(), line_no + 1))?;
        orders.push(order);
    }
    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const ORDER: &str = r#"{"restaurant_id":"r1","order_value":21.5,"number_of_items":3,"type_of_food":"pizza","city":"porto","country":"portugal","order_acknowledged_at":"2024-03-04T18:00:00Z","order_ready_at":"2024-03-04T18:30:00Z"}"#;

    #[test]
    fn test_read_orders_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.jsonl");
        std::fs::write(&path, format!("{ORDER}\n\n{ORDER}\n")).unwrap();

        let orders = read_orders(&path).unwrap();
        assert_eq!(orders.len(), 2);
        let dataset = Dataset::from_orders(orders).unwrap();
        assert_eq!(dataset.targets(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_read_orders_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.jsonl");
        std::fs::write(&path, format!("{ORDER}\nnot json\n")).unwrap();

        let err = read_orders(&path).unwrap_err();
        assert!(err.to_string().ends_with(":2: malformed order"));
    }

    #[test]
    fn test_variant_override() {
        let custom = OutlierFilter::Asap { max_prep_hours: 1.5 };
        assert_eq!(apply_variant(&custom, Variant::Asap), custom);
        assert_eq!(apply_variant(&custom, Variant::SameDay), OutlierFilter::same_day());
        assert_eq!(apply_variant(&custom, Variant::None), OutlierFilter::None);
    }

    #[test]
    fn test_config_init_writes_loadable_file() {
        let dir = TempDir::new().unwrap();
        handle_config(ConfigAction::Init, dir.path(), None).unwrap();

        let path = dir.path().join(".preptime").join("config.toml");
        assert!(path.exists());
        let loaded = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(loaded.split, PipelineConfig::default().split);
    }
}
