//! Utility to formulate a blend for a program stage from the command line
//!
//! Usage: formulate_stage <stage_id> <ingredient_id>... [--strategy exact|heuristic|auto] [--json]

use ration::config::AppConfig;
use ration::db::{migrations, Database};
use ration::formulation::LpEngine;
use ration::tools::formulation::{optimize_blend, BlendIngredientInput, FormulationRequest};
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "Usage: formulate_stage <stage_id> <ingredient_id>... [--strategy exact|heuristic|auto] [--json]";

struct Args {
    stage_id: i64,
    ingredient_ids: Vec<i64>,
    strategy: Option<String>,
    json: bool,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut ids = Vec::new();
    let mut strategy = None;
    let mut json = false;

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--strategy" => {
                strategy = Some(raw.next().ok_or("--strategy needs a value")?);
            }
            "--json" => json = true,
            other => ids.push(
                other
                    .parse::<i64>()
                    .map_err(|_| format!("'{}' is not an id\n{}", other, USAGE))?,
            ),
        }
    }

    if ids.len() < 2 {
        return Err(USAGE.to_string());
    }
    let stage_id = ids.remove(0);
    Ok(Args {
        stage_id,
        ingredient_ids: ids,
        strategy,
        json,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ration=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = AppConfig::from_env()?;
    eprintln!("Database path: {}", config.database_path.display());

    let database = Database::new(&config.database_path)?;
    database.with_conn(migrations::run_migrations)?;

    let request = FormulationRequest {
        ingredients: args
            .ingredient_ids
            .iter()
            .map(|&id| BlendIngredientInput {
                id,
                ratio: None,
                min: None,
                max: None,
                cost_per_kg: None,
            })
            .collect(),
        stage_id: Some(args.stage_id),
        targets: Vec::new(),
        strategy: args.strategy,
        exact_config: None,
        heuristic_config: None,
    };

    let result = optimize_blend(&database, LpEngine::shared(), &config, &request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.message);
    if let Some(ingredients) = &result.updated_ingredients {
        println!();
        println!("{:<30} {:>10}", "Ingredient", "Ratio");
        for item in ingredients {
            println!("{:<30} {:>10.3}", item.name(), item.ratio);
        }
    }
    if let Some(deviations) = &result.deviations {
        println!();
        println!("{:<30} {:>10} {:>10}", "Nutrient", "Target", "Actual");
        for d in deviations {
            println!(
                "{:<30} {:>10.3} {:>10.3}",
                d.nutrient.name,
                d.target,
                d.actual.unwrap_or(0.0)
            );
        }
    }
    if let Some(suggestions) = result.suggestions.as_ref().filter(|s| !s.is_empty()) {
        println!();
        println!("Suggestions:");
        for s in suggestions {
            match &s.ingredient_name {
                Some(name) => println!("  {:?}: {} for {}", s.kind, name, s.nutrient_name),
                None => println!("  {:?}: {}", s.kind, s.nutrient_name),
            }
        }
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
