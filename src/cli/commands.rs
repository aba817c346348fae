//! Command implementations for CLI operations

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::VaultConfig;
use crate::inspect::{inspect, InspectReport};
use crate::types::{AddOptions, AddResponse, RemoveResponse};

use super::root::{open_vault, vault_exists};

/// Add a file or directory and print the add response as JSON.
/// Returns whether the add succeeded.
pub fn add_command(root: &Path, path: &str, options: &AddOptions) -> Result<bool> {
    let mut vault = open_vault(root)?;
    let target = Path::new(path);

    let result = vault.add(target, options);
    if let Ok(report) = &result {
        info!("{}", report.summary());
        for failure in &report.errors {
            info!("  {}: {}", failure.path.display(), failure.error);
        }
    }

    let response = AddResponse::from(result);
    println!("{}", serde_json::to_string(&response)?);
    Ok(response.success)
}

/// Remove a source unit by hash and print the remove response as JSON.
/// Returns whether the removal succeeded.
pub fn remove_command(root: &Path, hash: &str) -> Result<bool> {
    let mut vault = open_vault(root)?;
    let response = RemoveResponse::from(vault.remove(hash));
    println!("{}", serde_json::to_string(&response)?);
    Ok(response.success)
}

/// Show index statistics for a vault
pub fn status_command(root: &Path) -> Result<()> {
    if !vault_exists(root) {
        println!("No vault found at {}", root.display());
        println!("Run 'codevault add <path>' first.");
        return Ok(());
    }

    let vault = open_vault(root)?;
    let stats = vault.stats()?;

    println!("codevault Status");
    println!("================");
    println!("Root: {}", root.display());
    println!("Source units: {}", stats.source_units);
    println!("Symbols: {}", stats.symbols);
    println!("Dependency edges: {}", stats.dependency_edges);
    println!("References: {}", stats.references);
    println!("Size: {:.2} KB", stats.db_size_bytes as f64 / 1024.0);

    if !stats.symbol_kinds.is_empty() {
        println!("\nSymbol Types:");
        for (kind, count) in &stats.symbol_kinds {
            println!("  {}: {}", kind.as_str(), count);
        }
    }

    Ok(())
}

/// Search for symbols by name prefix
pub fn search_command(root: &Path, query: &str) -> Result<()> {
    if !vault_exists(root) {
        println!("No vault found. Run 'codevault add <path>' first.");
        return Ok(());
    }

    let vault = open_vault(root)?;
    let results = vault.search_symbols(query, None, 20)?;

    if results.is_empty() {
        println!("No symbols found matching '{}'", query);
        return Ok(());
    }

    println!("Found {} symbols matching '{}':\n", results.len(), query);

    for symbol in results {
        println!(
            "  {} {} - {}@{}..{}",
            symbol.kind.as_str(),
            symbol.name,
            symbol.source_unit_key,
            symbol.start_pos,
            symbol.end_pos
        );
        if !symbol.dependencies.is_empty() {
            println!("    depends on: {}", symbol.dependencies.join(", "));
        }
    }

    Ok(())
}

/// Show a stored source unit and its symbols
pub fn show_command(root: &Path, hash: &str) -> Result<()> {
    let vault = open_vault(root)?;
    let unit = vault
        .source_unit(hash)
        .with_context(|| format!("Unknown source unit {}", hash))?;
    let symbols = vault.symbols_in_unit(&unit.key)?;

    println!("{}", unit.key);
    println!("  Description: {}", unit.description);
    println!("  Size: {} bytes", unit.size_bytes);
    println!("  Created: {}", unit.created_at);

    if !symbols.is_empty() {
        println!("\nSymbols:");
        for symbol in symbols {
            println!(
                "  {} [{}..{}] {}",
                symbol.key, symbol.start_pos, symbol.end_pos, symbol.description
            );
        }
    }

    Ok(())
}

/// Output format of the inspect command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectFormat {
    Table,
    Json,
}

impl InspectFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "table" => Some(InspectFormat::Table),
            "json" => Some(InspectFormat::Json),
            _ => None,
        }
    }
}

/// Parse a file or directory and print its symbols without storing anything
pub fn inspect_command(
    root: &Path,
    target: &str,
    recursive: bool,
    format: InspectFormat,
    detailed: bool,
) -> Result<()> {
    // Settings only; the vault itself is never opened
    let config = VaultConfig::load(root)
        .with_context(|| format!("Invalid vault settings in {}", root.display()))?;
    let report = inspect(Path::new(target), &config, recursive)
        .with_context(|| format!("Could not inspect {}", target))?;

    match format {
        InspectFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        InspectFormat::Table => print!("{}", format_table(&report, detailed)),
    }
    Ok(())
}

/// Render an inspect report as a table
pub fn format_table(report: &InspectReport, detailed: bool) -> String {
    let mut out = format!(
        "Symbols found: {} ({} files, {}ms)\n\n",
        report.total_count(),
        report.files_processed,
        report.elapsed_ms
    );
    for error in &report.errors {
        out.push_str(&format!("  error: {}\n", error));
    }
    if report.symbols.is_empty() {
        out.push_str("No symbols found.\n");
        return out;
    }

    let mut headers = vec!["Name", "Kind", "File", "Line", "Exported", "Default"];
    if detailed {
        headers.extend(["Column", "Dependencies"]);
    }
    let flag = |b: bool| (if b { "yes" } else { "no" }).to_string();
    let rows: Vec<Vec<String>> = report
        .symbols
        .iter()
        .map(|s| {
            let mut row = vec![
                s.name.clone(),
                s.kind.as_str().to_string(),
                report.display_path(&s.file_path).to_string(),
                s.line.to_string(),
                flag(s.exported),
                flag(s.default_export),
            ];
            if detailed {
                row.push(s.column.to_string());
                row.push(if s.dependencies.is_empty() {
                    "-".to_string()
                } else {
                    s.dependencies.join(", ")
                });
            }
            row
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };

    out.push_str(&line(headers.iter().map(|h| h.to_string()).collect()));
    out.push_str(&line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for (row, symbol) in rows.into_iter().zip(&report.symbols) {
        out.push_str(&line(row));
        if detailed {
            if let Some(doc) = &symbol.documentation {
                let first = doc.lines().next().unwrap_or_default();
                out.push_str(&format!("    {}\n", first));
            }
        }
    }
    out
}

/// Report differences between stored content and the symbol graph
pub fn reconcile_command(root: &Path, prune: bool) -> Result<()> {
    let mut vault = open_vault(root)?;
    let report = vault.reconcile(prune)?;

    println!("Orphaned content: {}", report.orphaned_content.len());
    for hash in &report.orphaned_content {
        println!("  {}", hash);
    }
    println!("Missing content: {}", report.missing_content.len());
    for hash in &report.missing_content {
        println!("  {}", hash);
    }
    if prune {
        println!("Pruned: {}", report.pruned);
    }

    Ok(())
}
