//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::state::{TargetKind, TargetStatus};
use crate::storage::Storage;
use crate::HarvestError;
use std::collections::HashMap;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of recipe targets tracked
    pub recipe_targets: u64,

    /// Count of recipe targets by status
    pub recipes_by_status: HashMap<TargetStatus, u64>,

    /// Total number of source-URL targets tracked
    pub url_targets: u64,

    /// Count of source-URL targets by status
    pub urls_by_status: HashMap<TargetStatus, u64>,

    /// Number of persisted recipes
    pub recipes_persisted: u64,

    /// Number of raw-response audit rows
    pub raw_responses: u64,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let recipe_targets = storage.count_targets(TargetKind::Recipe)?;
    let url_targets = storage.count_targets(TargetKind::SourceUrl)?;
    let recipes_persisted = storage.count_recipes()?;
    let raw_responses = storage.count_raw_responses()?;

    let mut recipes_by_status = HashMap::new();
    let mut urls_by_status = HashMap::new();

    for status in TargetStatus::all_statuses() {
        let count = storage.count_targets_by_status(TargetKind::Recipe, status)?;
        if count > 0 {
            recipes_by_status.insert(status, count);
        }

        let count = storage.count_targets_by_status(TargetKind::SourceUrl, status)?;
        if count > 0 {
            urls_by_status.insert(status, count);
        }
    }

    Ok(HarvestStatistics {
        recipe_targets,
        recipes_by_status,
        url_targets,
        urls_by_status,
        recipes_persisted,
        raw_responses,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Recipe targets tracked: {}", stats.recipe_targets);
    println!("  Recipes persisted: {}", stats.recipes_persisted);
    println!("  Raw responses stored: {}", stats.raw_responses);
    println!("  Source URLs tracked: {}", stats.url_targets);
    println!();

    print_status_breakdown("Recipe Targets by Status:", &stats.recipes_by_status);
    print_status_breakdown("Source URLs by Status:", &stats.urls_by_status);

    let succeeded = stats
        .recipes_by_status
        .get(&TargetStatus::Succeeded)
        .unwrap_or(&0);
    let success_rate = if stats.recipe_targets > 0 {
        (*succeeded as f64 / stats.recipe_targets as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} recipe targets succeeded)",
        success_rate, succeeded, stats.recipe_targets
    );
}

fn print_status_breakdown(heading: &str, by_status: &HashMap<TargetStatus, u64>) {
    if by_status.is_empty() {
        return;
    }

    println!("{}", heading);

    // Sort statuses by count (descending)
    let mut counts: Vec<_> = by_status.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in counts {
        println!("  {}: {}", status, count);
    }
    println!();
}
