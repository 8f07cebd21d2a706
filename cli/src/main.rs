use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kfs_merge_core::{MergeOptions, Schema};

#[derive(Debug, Parser)]
#[command(name = "kfsmerge")]
#[command(about = "Merge JSON instances according to a schema with x-kfs-merge rules")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge a request instance (A) into a base instance (B).
    Merge(MergeArgs),
    /// Validate instances against the schema without merging.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Schema source: file path, URL, or raw JSON.
    #[arg(long)]
    schema: String,
    /// Path to the request instance (A); takes precedence.
    #[arg(short = 'a', long)]
    request: PathBuf,
    /// Path to the base instance (B); supplies fallbacks.
    #[arg(short = 'b', long)]
    base: PathBuf,
    /// Output file path (default: stdout).
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Skip validation of instance A.
    #[arg(long)]
    skip_validate_a: bool,
    /// Skip validation of instance B.
    #[arg(long)]
    skip_validate_b: bool,
    /// Skip validation of the merged result.
    #[arg(long)]
    skip_validate_result: bool,
    /// Override the schema's applyDefaults setting (true/false).
    #[arg(long)]
    apply_defaults: Option<bool>,
    /// Pretty-print JSON output.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Schema source: file path, URL, or raw JSON.
    #[arg(long)]
    schema: String,
    /// Path to the request instance (A).
    #[arg(short = 'a', long)]
    request: Option<PathBuf>,
    /// Path to the base instance (B).
    #[arg(short = 'b', long)]
    base: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Merge(args) => run_merge(args),
        Command::Validate(args) => run_validate(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_merge(args: MergeArgs) -> Result<(), String> {
    let schema =
        Schema::load_from_source(&args.schema).map_err(|err| format!("loading schema: {err}"))?;

    let request = fs::read(&args.request)
        .map_err(|err| format!("failed to read '{}': {err}", args.request.display()))?;
    let base = fs::read(&args.base)
        .map_err(|err| format!("failed to read '{}': {err}", args.base.display()))?;

    let options = MergeOptions {
        skip_validate_a: args.skip_validate_a,
        skip_validate_b: args.skip_validate_b,
        skip_validate_result: args.skip_validate_result,
        apply_defaults: args.apply_defaults,
    };

    let result = schema
        .merge_with_options(&request, &base, options)
        .map_err(|err| format!("merge failed: {err}"))?;

    let mut output = if args.pretty {
        let value: serde_json::Value = serde_json::from_slice(&result)
            .map_err(|err| format!("failed to format result: {err}"))?;
        serde_json::to_vec_pretty(&value)
            .map_err(|err| format!("failed to format result: {err}"))?
    } else {
        result
    };
    output.push(b'\n');

    match &args.output {
        Some(path) => {
            fs::write(path, output)
                .map_err(|err| format!("failed to write '{}': {err}", path.display()))?;
            eprintln!("Result written to {}", path.display());
        }
        None => {
            std::io::stdout()
                .write_all(&output)
                .map_err(|err| format!("failed to write output: {err}"))?;
        }
    }

    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    if args.request.is_none() && args.base.is_none() {
        return Err("specify at least one instance to validate: -a and/or -b".to_string());
    }

    let schema =
        Schema::load_from_source(&args.schema).map_err(|err| format!("loading schema: {err}"))?;

    if let Some(path) = &args.request {
        validate_file(&schema, path, "A")?;
        println!("Instance A: valid");
    }
    if let Some(path) = &args.base {
        validate_file(&schema, path, "B")?;
        println!("Instance B: valid");
    }

    Ok(())
}

fn validate_file(schema: &Schema, path: &PathBuf, name: &str) -> Result<(), String> {
    let data =
        fs::read(path).map_err(|err| format!("failed to read '{}': {err}", path.display()))?;
    schema
        .validate(&data)
        .map_err(|err| format!("instance {name} validation failed: {err}"))
}
