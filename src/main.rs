use clap::{Parser as ClapParser, Subcommand};
use jtx::cli::{self, CheckResult, CliError, TransformOptions};
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "jtx")]
#[command(about = "jtx - Declarative JSON-to-JSON transforms written in JSON")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a transform against JSON input
    Transform {
        /// Path to the transform document
        transform: PathBuf,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Indentation width; 0 prints compact JSON
        #[arg(long, default_value_t = 0)]
        indent: usize,

        /// Host argument visible as $name, given as name=value
        #[arg(short, long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,
    },

    /// Compile a transform without running it
    Check {
        /// Path to the transform document
        transform: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform {
            transform,
            input,
            indent,
            args,
        } => run_transform(transform, input, indent, args),
        Commands::Check { transform } => run_check(transform),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_transform(path: PathBuf, input: Option<String>, indent: usize, args: Vec<String>) -> Result<(), CliError> {
    let transform = fs::read_to_string(&path)?;
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };
    let args = args.iter().map(|arg| cli::parse_arg(arg)).collect::<Result<Vec<_>, _>>()?;

    let options = TransformOptions {
        transform,
        input,
        indent,
        args,
    };
    println!("{}", cli::execute_transform(&options)?);
    Ok(())
}

fn run_check(path: PathBuf) -> Result<(), CliError> {
    let transform = fs::read_to_string(&path)?;
    match cli::execute_check(&transform)? {
        CheckResult::Valid { templates } => println!("Transform is valid ({} templates)", templates),
    }
    Ok(())
}
