use clap::{Parser, ValueEnum};
use jsonpath_query as jsonpath;
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read};

#[derive(Clone, ValueEnum, Debug)]
enum ErrorFormat {
    Human,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSONPath expression, e.g. $.store.book[?(@.price < 10)].title
    path: String,

    /// Read the JSON document from a file instead of stdin
    #[arg(long = "file")]
    file: Option<String>,

    /// Print only the matched values
    #[arg(long)]
    values: bool,

    /// Print only the normalized paths
    #[arg(long)]
    paths: bool,

    /// Print the first match only (null when nothing matches)
    #[arg(long)]
    first: bool,

    /// Print true/false depending on whether anything matches
    #[arg(long)]
    exists: bool,

    /// Surface missing keys, bad indices and shape mismatches as errors
    #[arg(long)]
    strict: bool,

    /// Depth bound for recursive descent (0 = unbounded)
    #[arg(long, default_value_t = 100)]
    max_depth: usize,

    /// Error output format
    #[arg(long = "error-format", value_enum, default_value_t = ErrorFormat::Human)]
    error_format: ErrorFormat,

    /// Increase verbosity (also controllable via RUST_LOG)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn read_stdin() -> io::Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn run(args: &Args) -> jsonpath::Result<Value> {
    let document = if let Some(path) = args.file.as_deref() {
        fs::read_to_string(path).expect("failed to read --file")
    } else {
        read_stdin().expect("failed to read document from stdin")
    };
    let data = document.as_bytes();

    let opts = jsonpath::QueryOptions::default()
        .with_max_depth(args.max_depth)
        .with_allow_missing_keys(args.strict);

    if args.exists {
        return Ok(Value::Bool(jsonpath::exists(data, &args.path, &opts)?));
    }
    if args.first {
        return Ok(jsonpath::first(data, &args.path, &opts)?
            .map(|m| m.to_json())
            .unwrap_or(Value::Null));
    }
    if args.values {
        return Ok(Value::Array(jsonpath::values(data, &args.path, &opts)?));
    }
    if args.paths {
        return Ok(Value::Array(
            jsonpath::paths(data, &args.path, &opts)?
                .into_iter()
                .map(Value::String)
                .collect(),
        ));
    }
    Ok(Value::Array(
        jsonpath::query(data, &args.path, &opts)?
            .iter()
            .map(|m| m.to_json())
            .collect(),
    ))
}

fn main() {
    let args = Args::parse();
    if args.verbose > 0 {
        let level = match args.verbose {
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }
    tracing_subscriber::fmt::init();

    match run(&args) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
        Err(e) => {
            match args.error_format {
                ErrorFormat::Human => {
                    eprintln!("{e}");
                }
                ErrorFormat::Json => {
                    let out = json!({
                        "error": e.to_string(),
                        "code": format!("{:?}", e.code()),
                    });
                    println!("{}", serde_json::to_string_pretty(&out).unwrap());
                }
            }
            std::process::exit(1);
        }
    }
}
