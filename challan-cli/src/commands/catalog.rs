//! Catalog command implementation.

use anyhow::Result;
use colored::Colorize;

use challan_core::catalog;

/// Execute the catalog command.
pub fn execute() -> Result<()> {
    println!("{}", "Detectable violations".bold());
    println!();

    for entry in catalog() {
        println!(
            "  {:>2}. {} {}",
            entry.id,
            entry.name.green().bold(),
            format!("[{}]", entry.category).dimmed()
        );
        println!("      {}", entry.description);
        println!(
            "      Fine ₹{} under Section {}",
            entry.fine_amount, entry.section
        );
        println!();
    }

    Ok(())
}
