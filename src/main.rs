//! looptran - Directive-Driven Source-to-Source Transformation Engine
//!
//! Main command-line interface for the transformation engine.

use looptran::config::Configuration;
use looptran::ir::{read_program, write_program, Program};

use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "looptran")]
#[command(version = looptran::VERSION)]
#[command(about = "Directive-driven source-to-source transformation engine")]
#[command(long_about = r#"
looptran rewrites array-oriented numerical programs at the IR level. It
reads a tree-shaped IR document produced by a front-end, applies the
transformations requested by in-source directives (loop extraction, loop
fusion, loop interchange, accelerator insertion, statement removal), and
writes the transformed IR for a back-end to render.

Example usage:
  looptran transform input.ir.json -o output.ir.json
  looptran transform input.ir.json --config-path ./config --config site.json
  looptran config --config-path ./config
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform an IR document
    Transform {
        /// Input IR document
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory holding configuration and transformation set documents
        #[arg(long)]
        config_path: Option<PathBuf>,

        /// Alternative root or extension configuration document
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured target architecture
        #[arg(long)]
        target: Option<String>,

        /// Override the configured accelerator directive language
        #[arg(long)]
        directive: Option<String>,
    },

    /// Display the resolved configuration
    Config {
        /// Directory holding configuration and transformation set documents
        #[arg(long)]
        config_path: Option<PathBuf>,

        /// Alternative root or extension configuration document
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform {
            input,
            output,
            config_path,
            config,
            target,
            directive,
        } => cmd_transform(input, output, config_path, config, target, directive),
        Commands::Config { config_path, config } => cmd_config(config_path, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn load_configuration(
    config_path: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<Configuration> {
    let path = config_path.unwrap_or_else(|| PathBuf::from("."));
    Configuration::load(&path, config.as_deref()).context("Failed to load configuration")
}

fn cmd_transform(
    input: PathBuf,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    config: Option<PathBuf>,
    target: Option<String>,
    directive: Option<String>,
) -> Result<()> {
    let mut configuration = load_configuration(config_path, config)?;
    configuration.set_user_target(target.as_deref());
    configuration.set_user_directive(directive.as_deref());

    let document = fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mut program = read_program(&document).context("Failed to read IR document")?;

    let result = looptran::translate(&mut program, &configuration);
    print_diagnostics(&program);
    result.context("Transformation pipeline aborted")?;

    let transformed = write_program(&program);
    if let Some(out_path) = output {
        fs::write(&out_path, &transformed)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        eprintln!("Wrote {} bytes to {}", transformed.len(), out_path.display());
    } else {
        println!("{}", transformed);
    }
    Ok(())
}

fn print_diagnostics(program: &Program) {
    for error in program.errors() {
        eprintln!("error: {}", error);
    }
    for warning in program.warnings() {
        eprintln!("warning: {}", warning);
    }
}

fn cmd_config(config_path: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let configuration = load_configuration(config_path, config)?;

    println!("- looptran configuration -\n");
    if let Some(target) = configuration.parameter(looptran::config::DEFAULT_TARGET) {
        println!("Default target: {}", target);
    }
    if let Some(directive) = configuration.parameter(looptran::config::DEFAULT_DIRECTIVE) {
        println!("Default accelerator directive: {}", directive);
    }
    println!("Current transformation order:");
    for (index, group) in configuration.groups().iter().enumerate() {
        println!(
            "  {:2}) {:<12} {:<18} - type:{:<12} class:{}",
            index,
            group.set,
            group.name,
            match group.kind {
                looptran::config::GroupKind::Dependent => "dependent",
                looptran::config::GroupKind::Independent => "independent",
            },
            group.class_path,
        );
    }
    Ok(())
}
