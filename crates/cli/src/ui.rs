use std::time::Duration;

use colored::Colorize;

use toprank_core::{ScoredEntity, StrategyKind};

pub fn print_heading(text: &str) {
    println!();
    println!("{}", text.bold());
}

pub fn print_entities(entities: &[ScoredEntity]) {
    if entities.is_empty() {
        println!("{}", "  (no entities)".dimmed());
        return;
    }

    println!(
        "{}",
        format!("  {:>4}  {:>12}  {:>8}  {:>10}", "rank", "id", "score", "visits").dimmed()
    );

    for (rank, e) in entities.iter().enumerate() {
        println!(
            "  {:>4}  {:>12}  {:>8}  {:>10}",
            (rank + 1).to_string().cyan(),
            e.id,
            format!("{:.2}", e.primary_score).yellow(),
            e.secondary_score
        );
    }
}

pub fn print_skipped(skipped: &[String]) {
    if skipped.is_empty() {
        return;
    }

    eprintln!(
        "{}: {}",
        "Unknown categories skipped".yellow(),
        skipped.join(", ")
    );
}

pub fn print_strategy(strategy: StrategyKind, elapsed: Duration) {
    println!(
        "{}",
        format!("[strategy: {strategy}, {:.3} ms]", elapsed.as_secs_f64() * 1_000.0).dimmed()
    );
}

pub fn print_timing_row(label: &str, runs: usize, total: Duration) {
    let mean_us = if runs == 0 {
        0.0
    } else {
        total.as_secs_f64() * 1_000_000.0 / runs as f64
    };

    println!(
        "  {:<10} {:>8} runs  {:>12} mean",
        label.cyan(),
        runs,
        format!("{mean_us:.1} µs").yellow()
    );
}
