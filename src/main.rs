use clap::Parser;
use serde::Deserialize;
use serde_json::Value;

use mock_state::StateExtension;

/// Scenario runner: replay recorded triggers against a fresh state store and
/// print rendered query results.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a JSON scenario file (array of steps).
    scenario: std::path::PathBuf,
}

/// One scenario step: a trigger configuration with its request/response
/// model, and/or a `state` query whose rendered result is printed.
#[derive(Debug, Deserialize)]
struct Step {
    #[serde(default)]
    trigger: Option<Value>,
    #[serde(default)]
    model: Option<Value>,
    #[serde(default)]
    query: Option<String>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let raw = match std::fs::read_to_string(&args.scenario) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("cannot read {}: {e}", args.scenario.display());
            std::process::exit(1);
        }
    };
    let steps: Vec<Step> = match serde_json::from_str(&raw) {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("invalid scenario: {e}");
            std::process::exit(1);
        }
    };

    let extension = StateExtension::with_defaults();
    for step in steps {
        if let Some(trigger) = &step.trigger {
            let model = step.model.clone().unwrap_or(Value::Null);
            // A bad trigger rejects that event only; the run continues.
            if let Err(e) = extension.on_serve_event(trigger, &model) {
                tracing::warn!(error = %e, "trigger rejected");
            }
        }
        if let Some(query) = &step.query {
            println!("{}", extension.render_state(query));
        }
    }
}
