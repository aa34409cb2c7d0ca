//! Redgraph CLI
//!
//! Build-time tooling for the Redfish aggregation layer:
//! - Walking a local DMTF schema tree to discover top-level collection URIs
//!   and their ancestor map (`discover`)
//! - Reviewing a previously generated catalog (`show`)
//!
//! Network retrieval of schema archives is a separate step; this tool only
//! consumes a directory tree that step already populated.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use redgraph_collections::{
    discover, CatalogExportV1, CATALOG_VERSION_V1, SERVICE_ROOT_FILE, SERVICE_ROOT_PATH,
};
use redgraph_csdl::DirectorySource;

#[derive(Parser)]
#[command(name = "redgraph")]
#[command(author, version, about = "Redfish schema collection-graph tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the schema graph from the service root and write the collection
    /// catalog as JSON.
    Discover {
        /// Local schema directory tree (populated by the schema fetch step)
        #[arg(long)]
        schema_dir: PathBuf,
        /// Schema document to start from
        #[arg(long, default_value = SERVICE_ROOT_FILE)]
        root_file: String,
        /// Service root URI prefixed onto every discovered path
        #[arg(long, default_value = SERVICE_ROOT_PATH)]
        service_root: String,
        /// Output catalog JSON
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Pretty-print a previously generated catalog for review.
    Show {
        /// Catalog JSON produced by `discover`
        catalog: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Discover {
            schema_dir,
            root_file,
            service_root,
            out,
        } => cmd_discover(&schema_dir, &root_file, &service_root, &out),
        Commands::Show { catalog } => cmd_show(&catalog),
    }
}

fn cmd_discover(
    schema_dir: &PathBuf,
    root_file: &str,
    service_root: &str,
    out: &PathBuf,
) -> Result<()> {
    println!(
        "{} schema tree {}",
        "Scanning".green().bold(),
        schema_dir.display()
    );
    let source = DirectorySource::new(schema_dir)
        .with_context(|| format!("failed to scan {}", schema_dir.display()))?;
    if source.is_empty() {
        bail!("no schema files under {}", schema_dir.display());
    }
    println!("  {} {} schema files indexed", "→".cyan(), source.len());

    println!(
        "{} collection graph from {} ({})",
        "Walking".green().bold(),
        service_root,
        root_file
    );
    let catalog = discover(&source, service_root, root_file)?;
    for path in &catalog.top_collections {
        println!("  {} top-level collection {}", "+".cyan(), path);
    }

    // Write only after the walk fully succeeded; a failed run must not leave
    // a partial artifact behind for the build to compile in.
    let export = catalog.export();
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(out, serde_json::to_string_pretty(&export)?)?;
    println!(
        "  {} {} (collections={}, ancestors={})",
        "→".cyan(),
        out.display(),
        export.top_collections.len(),
        export.collection_parents.len()
    );

    Ok(())
}

fn cmd_show(catalog: &PathBuf) -> Result<()> {
    let text = fs::read_to_string(catalog)
        .with_context(|| format!("failed to read {}", catalog.display()))?;
    let export: CatalogExportV1 =
        serde_json::from_str(&text).with_context(|| format!("invalid catalog JSON: {}", catalog.display()))?;
    if export.version != CATALOG_VERSION_V1 {
        bail!(
            "unsupported catalog version {} (reader supports {})",
            export.version,
            CATALOG_VERSION_V1
        );
    }

    println!("{}", "Top-level collections:".green().bold());
    for path in &export.top_collections {
        println!("  {path}");
    }

    println!();
    println!("{}", "Collection ancestors:".green().bold());
    for (parent, children) in &export.collection_parents {
        println!("  {parent}");
        for child in children {
            println!("    {} {}", "→".cyan(), child);
        }
    }

    Ok(())
}
