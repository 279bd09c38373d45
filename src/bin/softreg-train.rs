//! Developer utility to train a softmax regression classifier and save it.

use std::path::PathBuf;

use softreg::config::{self, Config};
use softreg::logging;
use softreg::ml::dataset::{Dataset, DatasetFile, matrix_to_rows};
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
    source: DataSource,
    model_out: Option<PathBuf>,
    learning_rate: Option<f64>,
    iterations: Option<usize>,
    l2: Option<f64>,
    seed: Option<u64>,
}

#[derive(Debug, Clone)]
enum DataSource {
    File(PathBuf),
    Toy,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("File logging disabled: {err}");
        logging::init_console().map_err(|err| err.to_string())?;
    }

    let mut config = config::load_or_default().map_err(|err| err.to_string())?;
    apply_overrides(&mut config, &options);
    let model_out = match options.model_out.clone() {
        Some(path) => path,
        None => config.model_path().map_err(|err| err.to_string())?,
    };

    let (rows, labels) = match &options.source {
        DataSource::File(path) => {
            let file = DatasetFile::load(path).map_err(|err| err.to_string())?;
            (file.x, file.y)
        }
        DataSource::Toy => {
            let toy = Dataset::three_clusters();
            (matrix_to_rows(&toy.features), toy.labels)
        }
    };
    let dataset = Dataset::new(&rows, labels).map_err(|err| err.to_string())?;

    let store = ModelStore::open(&model_out);
    let report = store
        .train_dataset(
            &dataset,
            config.training.hyperparameters(),
            config.training.seed_policy(),
        )
        .map_err(|err| err.to_string())?;
    let model = store
        .current()
        .ok_or_else(|| "Training finished without an active model".to_string())?;

    let eval = evaluate(&model, &dataset.features, &dataset.labels).map_err(|err| err.to_string())?;
    println!("samples: {}", dataset.n_samples());
    println!("features: {}  classes: {}", report.n_features, report.n_classes);
    println!("training accuracy: {:.4}", eval.accuracy);
    for (idx, stats) in eval.per_class.iter().enumerate() {
        println!(
            "class {:>2}  precision={:.3}  recall={:.3}  f1={:.3}  support={}",
            idx,
            stats.precision,
            stats.recall,
            stats.f1(),
            stats.support
        );
    }
    println!("confusion matrix (rows=true, cols=pred):");
    for truth in 0..eval.confusion.n_classes() {
        let mut row = String::new();
        for pred in 0..eval.confusion.n_classes() {
            row.push_str(&format!("{:6}", eval.confusion.get(truth, pred)));
        }
        println!("{row}");
    }

    if !report.persisted {
        return Err(format!("Failed to save model to {}", model_out.display()));
    }
    println!("model saved to {}", model_out.display());
    Ok(())
}

fn apply_overrides(config: &mut Config, options: &CliOptions) {
    if let Some(value) = options.learning_rate {
        config.training.learning_rate = value;
    }
    if let Some(value) = options.iterations {
        config.training.n_iter = value;
    }
    if let Some(value) = options.l2 {
        config.training.reg_lambda = value;
    }
    if options.seed.is_some() {
        config.training.seed = options.seed;
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut dataset: Option<PathBuf> = None;
    let mut toy = false;
    let mut model_out: Option<PathBuf> = None;
    let mut learning_rate: Option<f64> = None;
    let mut iterations: Option<usize> = None;
    let mut l2: Option<f64> = None;
    let mut seed: Option<u64> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                dataset = Some(PathBuf::from(value));
            }
            "--toy" => {
                toy = true;
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                model_out = Some(PathBuf::from(value));
            }
            "--learning-rate" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--learning-rate requires a value".to_string())?;
                learning_rate = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --learning-rate value: {value}"))?,
                );
            }
            "--iterations" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--iterations requires a value".to_string())?;
                iterations = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --iterations value: {value}"))?,
                );
            }
            "--l2" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--l2 requires a value".to_string())?;
                l2 = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --l2 value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let source = match (dataset, toy) {
        (Some(_), true) => return Err("Use either --dataset or --toy, not both".to_string()),
        (Some(path), false) => DataSource::File(path),
        (None, true) => DataSource::Toy,
        (None, false) => return Err(help_text()),
    };
    Ok(CliOptions {
        source,
        model_out,
        learning_rate,
        iterations,
        l2,
        seed,
    })
}

fn help_text() -> String {
    [
        "softreg-train",
        "",
        "Trains a softmax regression classifier and saves it as JSON.",
        "",
        "Usage:",
        "  softreg-train --dataset <file.json> [--out model.json] [options]",
        "  softreg-train --toy [--out model.json] [options]",
        "",
        "Options:",
        "  --dataset <file>       JSON file shaped {\"x\": [[...]], \"y\": [...]}.",
        "  --toy                  Train on the built-in three-cluster toy set.",
        "  --out <file>           Output model path (default: [model] path in softreg.toml).",
        "  --learning-rate <f64>  Learning rate (default: 0.1).",
        "  --iterations <n>       Gradient-descent iterations (default: 2000).",
        "  --l2 <f64>             L2 penalty on weights (default: 1e-3).",
        "  --seed <u64>           Initialization seed (default: random).",
        "",
        "Values are used as given. Defaults can be changed in softreg.toml.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_toy_with_overrides() {
        let options = parse_args(args(&["--toy", "--iterations", "50", "--seed", "9"])).unwrap();
        assert!(matches!(options.source, DataSource::Toy));
        assert_eq!(options.iterations, Some(50));
        assert_eq!(options.seed, Some(9));
        assert_eq!(options.learning_rate, None);
    }

    #[test]
    fn requires_a_data_source() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--toy", "--dataset", "x.json"])).is_err());
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = parse_args(args(&["--toy", "--l2", "lots"])).unwrap_err();
        assert!(err.contains("--l2"));
    }

    #[test]
    fn overrides_replace_config_values() {
        let options = parse_args(args(&["--toy", "--learning-rate", "0.5", "--seed", "3"])).unwrap();
        let mut config = Config::default();
        apply_overrides(&mut config, &options);
        assert_eq!(config.training.learning_rate, 0.5);
        assert_eq!(config.training.seed, Some(3));
        assert_eq!(config.training.n_iter, 2000);
    }

    #[test]
    fn zero_l2_override_is_kept() {
        let options = parse_args(args(&["--toy", "--l2", "0"])).unwrap();
        let mut config = Config::default();
        apply_overrides(&mut config, &options);
        assert_eq!(config.training.hyperparameters().reg_lambda, 0.0);
    }
}
