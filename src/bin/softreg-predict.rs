//! Developer utility to run a saved softmax model over a JSON feature file.

use std::path::PathBuf;

use softreg::config;
use softreg::logging;
use softreg::ml::dataset::DatasetFile;
use softreg::ml::metrics::evaluate;
use softreg::ml::store::ModelStore;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    model_path: Option<PathBuf>,
    input: PathBuf,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init_console() {
        eprintln!("Logging disabled: {err}");
    }
    let model_path = match options.model_path {
        Some(path) => path,
        None => config::load_or_default()
            .and_then(|config| config.model_path())
            .map_err(|err| err.to_string())?,
    };

    let input = DatasetFile::load(&options.input).map_err(|err| err.to_string())?;
    let store = ModelStore::open(&model_path);
    let prediction = store.predict(&input.x).map_err(|err| err.to_string())?;
    let json = serde_json::to_string_pretty(&prediction).map_err(|err| err.to_string())?;
    println!("{json}");

    if !input.y.is_empty() {
        let model = store
            .current()
            .ok_or_else(|| "No model loaded".to_string())?;
        let features = input.features().map_err(|err| err.to_string())?;
        let eval = evaluate(&model, &features, &input.y).map_err(|err| err.to_string())?;
        eprintln!("accuracy: {:.4}", eval.accuracy);
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut model_path: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_path = Some(PathBuf::from(value));
            }
            "--input" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--input requires a value".to_string())?;
                input = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let input = input.ok_or_else(help_text)?;
    Ok(CliOptions { model_path, input })
}

fn help_text() -> String {
    [
        "softreg-predict",
        "",
        "Prints predicted labels and class probabilities as JSON.",
        "",
        "Usage:",
        "  softreg-predict --input <file.json> [--model model.json]",
        "",
        "Options:",
        "  --input <file>   JSON file shaped {\"x\": [[...]]}; an optional \"y\" reports accuracy.",
        "  --model <file>   Model path (default: [model] path in softreg.toml).",
    ]
    .join("\n")
}
