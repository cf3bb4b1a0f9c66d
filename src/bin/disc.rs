// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! disc CLI
//!
//! Command-line interface for discrepancy reporting and autofix over ASN.1
//! sequence submissions.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ferro_disc::cli::{write_report, OutputFormat};
use ferro_disc::registry::{all_tests, find_test, groups, tests_in_group};
use ferro_disc::render::RenderOptions;
use ferro_disc::{DiscConfig, DiscrepancyContext, RunSettings, TestSelection};

#[derive(Parser)]
#[command(name = "disc")]
#[command(author, version, about = "Discrepancy reporting for sequence submissions")]
#[command(
    long_about = "Run discrepancy tests over ASN.1 sequence submissions and
optionally apply automatic fixes.

Examples:
  disc run submission.sqn
  disc run -t COUNT_NUCLEOTIDES,N_RUNS --format json submission.sqn
  disc run --big-file huge.sqn
  disc autofix submission.sqn
  disc list-tests --group oncaller
  disc explain COUNTRY_COLON"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run discrepancy tests and print the report
    Run {
        /// Input files (ASN.1 text, optionally gzipped)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Comma-separated test names to run (default: the default group)
        #[arg(short = 't', long, value_delimiter = ',')]
        tests: Vec<String>,

        /// Comma-separated test names to exclude
        #[arg(short = 'x', long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Comma-separated test groups (default, submitter, oncaller, big)
        #[arg(short = 'g', long, value_delimiter = ',')]
        groups: Vec<String>,

        /// Bound peak memory by skipping sibling subtrees during decode
        #[arg(long)]
        big_file: bool,

        /// Output format
        #[arg(short = 'f', long, default_value = "text", value_parser = ["text", "json", "xml"])]
        format: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include extended detail rows and flagged objects
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run tests, then apply automatic fixes to a copy of each input
    Autofix {
        /// Input files (ASN.1 text, optionally gzipped)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Comma-separated test names to run (default: all autofix tests)
        #[arg(short = 't', long, value_delimiter = ',')]
        tests: Vec<String>,

        /// Bound peak memory by skipping sibling subtrees during decode
        #[arg(long)]
        big_file: bool,
    },

    /// List registered tests
    ListTests {
        /// Only tests in this group
        #[arg(short = 'g', long)]
        group: Option<String>,
    },

    /// Explain one test by name or alias
    Explain {
        /// Test name (case-insensitive)
        name: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            files,
            tests,
            exclude,
            groups: group_names,
            big_file,
            format,
            output,
            verbose,
        } => {
            let settings = build_settings(tests, exclude, group_names, big_file);
            let mut ctx = DiscrepancyContext::new(settings);
            for file in &files {
                ctx.process_file(file)?;
            }
            let report = ctx.summarize();
            let format: OutputFormat = format.parse()?;
            let options = RenderOptions {
                verbose,
                show_objects: verbose,
            };
            match output {
                Some(path) => {
                    let mut out = BufWriter::new(File::create(path)?);
                    write_report(&mut out, &report, format, options)?;
                    out.flush()?;
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    write_report(&mut out, &report, format, options)?;
                }
            }
            Ok(())
        }

        Commands::Autofix {
            files,
            tests,
            big_file,
        } => {
            let mut settings = build_settings(tests, Vec::new(), Vec::new(), big_file);
            if settings.selection.include.is_empty() {
                // nothing requested: run every test that can fix anything
                settings.selection = TestSelection::all();
            }
            let mut ctx = DiscrepancyContext::new(settings);
            for file in &files {
                ctx.process_file(file)?;
            }
            let _report = ctx.summarize();
            let summary = ctx.autofix()?;
            eprintln!(
                "Applied {} fix(es), {} declined, {} not found",
                summary.applied, summary.declined, summary.missed
            );
            for output in &summary.outputs {
                eprintln!("  wrote {}", output.display());
            }
            Ok(())
        }

        Commands::ListTests { group } => {
            let tests = match group.as_deref() {
                Some(name) => {
                    let flags = groups::from_name(name)
                        .ok_or_else(|| format!("unknown group '{}'", name))?;
                    tests_in_group(flags)
                }
                None => all_tests().to_vec(),
            };
            for desc in tests {
                println!(
                    "{:<26} {:>4}  [{}]{}  {}",
                    desc.name,
                    desc.code,
                    groups::names(desc.groups),
                    if desc.autofix { " (autofix)" } else { "" },
                    desc.description
                );
            }
            Ok(())
        }

        Commands::Explain { name } => {
            let desc = find_test(&name).ok_or_else(|| format!("unknown test '{}'", name))?;
            println!("{} (code {})", desc.name, desc.code);
            println!("  {}", desc.description);
            println!("  groups: {}", groups::names(desc.groups));
            if !desc.aliases.is_empty() {
                println!("  aliases: {}", desc.aliases.join(", "));
            }
            println!("  autofix: {}", if desc.autofix { "yes" } else { "no" });
            Ok(())
        }
    }
}

/// CLI flags layered over the config file, flags winning.
fn build_settings(
    include: Vec<String>,
    exclude: Vec<String>,
    group_names: Vec<String>,
    big_file: bool,
) -> RunSettings {
    let config = DiscConfig::load().unwrap_or_default();
    let mut selection = config.selection();
    if !include.is_empty() {
        selection.include = include;
    }
    if !exclude.is_empty() {
        selection.exclude = exclude;
    }
    if !group_names.is_empty() {
        selection.groups = group_names
            .iter()
            .filter_map(|g| groups::from_name(g))
            .fold(0, |acc, g| acc | g);
    }
    RunSettings {
        big_file: big_file || config.big_file.unwrap_or(false),
        selection,
    }
}
