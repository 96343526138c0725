use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use erdraw::Config;

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Svg,
    Json,
}

#[derive(Parser)]
#[command(name = "erdraw", about = "Compile Mermaid-style ER diagrams to SVG")]
struct Cli {
    /// Input files (reads from stdin if none are given)
    files: Vec<PathBuf>,

    /// Emit literal pixel width/height instead of a max-width style
    #[arg(long)]
    fixed: bool,

    /// JSON config file (`{"logLevel": .., "er": {..}}`)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "svg")]
    format: Format,

    /// Diagnostic verbosity, 0 (trace) to 5 (fatal); overrides the config
    #[arg(long)]
    log_level: Option<u8>,
}

fn load_config(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("ERROR: failed to read {}: {e}", path.display());
                std::process::exit(1);
            });
            Config::from_json(&text).unwrap_or_else(|e| {
                eprintln!("ERROR: invalid config {}: {e}", path.display());
                std::process::exit(1);
            })
        }
        None => Config::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.fixed {
        config = config.with_max_width(false);
    }
    config
}

fn read_inputs(cli: &Cli) -> Vec<(String, String)> {
    if cli.files.is_empty() {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to read stdin: {e}");
            std::process::exit(1);
        });
        return vec![("<stdin>".to_string(), buf)];
    }
    cli.files
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("ERROR: failed to read {}: {e}", path.display());
                std::process::exit(1);
            });
            (path.display().to_string(), text)
        })
        .collect()
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(config.log_filter())
        .init();

    let inputs = read_inputs(&cli);
    let sources: Vec<&str> = inputs.iter().map(|(_, text)| text.as_str()).collect();
    let results = erdraw::compile_batch(&sources, &config);

    let mut failed = false;
    for ((name, _), result) in inputs.iter().zip(results) {
        match result {
            Ok(drawing) => match cli.format {
                Format::Svg => print!("{}", erdraw::svg::to_svg(&drawing)),
                Format::Json => match serde_json::to_string_pretty(&drawing) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("ERROR: {name}: {e}");
                        failed = true;
                    }
                },
            },
            Err(e) => {
                eprintln!("ERROR: {name}: {e}");
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}
