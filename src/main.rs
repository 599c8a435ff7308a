mod analyzer;
mod collector;
mod models;
mod scraper;
mod stats;

use analyzer::{
    decision_counts, filter_records, gre_era_counts, group_stats, load_records,
    plot_gre_scatter, write_filtered_csv,
};
use anyhow::Result;
use clap::{Arg, Command};
use collector::{collect_pages, normalize_records, write_records_csv, StopReason};
use env_logger::Env;
use models::Config;
use std::collections::BTreeSet;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("gradstat")
        .version("1.0")
        .about("Collects and analyzes graduate admissions self-reports for one program")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .subcommand(Command::new("collect").about("Scrape the survey listing into a CSV"))
        .subcommand(Command::new("analyze").about("Filter a bulk dataset and plot GRE scores"))
        .subcommand_required(true)
        .get_matches();

    let config_file = matches.get_one::<String>("config").unwrap();

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        let default_config = Config::default();
        default_config.save_to_file(config_file)?;
        println!(
            "⚠️  Please review {} (query, filters, paths), then run the program again.",
            config_file
        );
        return Ok(());
    };

    match matches.subcommand() {
        Some(("collect", _)) => {
            init_file_logging(&config.collector.log_file)?;
            run_collect(&config).await
        }
        Some(("analyze", _)) => {
            env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
            run_analyze(&config)
        }
        _ => unreachable!("a subcommand is required"),
    }
}

/// Route log records to the collector's free-running log file.
fn init_file_logging(path: &str) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    log::info!("Logging is set up.");
    Ok(())
}

async fn run_collect(config: &Config) -> Result<()> {
    log::info!(
        "Starting data collection for {} {} {}",
        config.query.institution,
        config.query.program,
        config.query.degree
    );
    println!(
        "🌐 Collecting {} {} {} results (pages {}..{})",
        config.query.institution,
        config.query.program,
        config.query.degree,
        config.collector.start_page,
        config.collector.end_page
    );

    // Missing browser or driver surfaces here, before any scraping work.
    let mut session = scraper::BrowserSession::start(&config.collector, config.query.clone()).await?;

    // Run the whole loop, then close the driver before reporting anything,
    // so the session is quit on every path past this point.
    let outcome = collect_pages(&mut session, &config.collector, &config.filter).await;
    session.close().await?;

    println!(
        "📄 Fetched {} pages, {} qualifying entries",
        outcome.pages_fetched,
        outcome.records.len()
    );
    match outcome.stop {
        StopReason::FetchError(page) => {
            println!("⚠️  Page {} failed to fetch; the result set may be truncated.", page)
        }
        StopReason::MissingTable(page) => println!(
            "⚠️  Page {} had no results table (snapshot saved); the result set may be truncated.",
            page
        ),
        StopReason::EmptyPage(_) | StopReason::EndBound => {}
    }

    if outcome.records.is_empty() {
        println!("No data scraped.");
        log::info!("No data scraped.");
        return Ok(());
    }

    let mut records = outcome.records;
    normalize_records(&mut records);

    match write_records_csv(&config.collector.output_csv, &records) {
        Ok(()) => {
            log::info!(
                "Data successfully saved to {}. Total entries: {}.",
                config.collector.output_csv,
                records.len()
            );
            println!(
                "\n✅ Data saved to {}. Total entries: {}.",
                config.collector.output_csv,
                records.len()
            );
        }
        Err(e) => {
            log::error!("Failed to save data to CSV: {:#}", e);
            println!("❌ Failed to save data to CSV: {:#}", e);
        }
    }

    println!("\nDecision Summary:");
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for record in &records {
        *counts.entry(record.decision.as_str()).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    for (decision, count) in counts {
        println!("   {:<10} {}", decision, count);
    }

    println!("\nUnique institutions found:");
    let institutions: BTreeSet<&str> =
        records.iter().map(|r| r.institution.as_str()).collect();
    for institution in institutions {
        println!("   {}", institution);
    }

    log::info!("Data collection run has completed.");
    Ok(())
}

fn run_analyze(config: &Config) -> Result<()> {
    println!("Starting admissions data analysis...");

    let records = match load_records(&config.analyzer.input_csv) {
        Ok(records) => {
            println!("✅ Successfully loaded data ({} rows)", records.len());
            records
        }
        Err(e) => {
            println!("❌ Could not load the data file: {:#}", e);
            return Ok(());
        }
    };

    let filtered = filter_records(
        &records,
        &config.analyzer.institution_filter,
        &config.analyzer.major_filter,
    );
    println!(
        "\nFound {} {} / {} entries",
        filtered.len(),
        config.analyzer.institution_filter,
        config.analyzer.major_filter
    );

    if filtered.is_empty() {
        println!("No data available for analysis");
        return Ok(());
    }

    println!("\nDecision Summary:");
    for (decision, count) in decision_counts(&filtered) {
        println!("   {:<15} {}", decision, count);
    }

    println!("\nStats Summary (mean / count by decision):");
    println!(
        "   {:<15} {:>12} {:>12} {:>12} {:>12}",
        "decision", "ugrad_gpa", "gre_verbal", "gre_quant", "gre_writing"
    );
    for stats in group_stats(&filtered) {
        println!(
            "   {:<15} {:>7} ({:>3}) {:>7} ({:>3}) {:>7} ({:>3}) {:>7} ({:>3})",
            stats.decision,
            stats.ugrad_gpa.display_mean(),
            stats.ugrad_gpa.count,
            stats.gre_verbal.display_mean(),
            stats.gre_verbal.count,
            stats.gre_quant.display_mean(),
            stats.gre_quant.count,
            stats.gre_writing.display_mean(),
            stats.gre_writing.count,
        );
    }

    let (new_scale, old_scale) = gre_era_counts(&filtered);
    println!(
        "\nGRE score scale: {} new-scale entries, {} old-scale entries",
        new_scale, old_scale
    );

    match plot_gre_scatter(&filtered, &config.analyzer.plot_file) {
        Ok(()) => println!("\n📊 GRE score plot saved as {}", config.analyzer.plot_file),
        Err(e) => {
            log::error!("Failed to render plot: {:#}", e);
            println!("❌ Failed to render plot: {:#}", e);
        }
    }

    match write_filtered_csv(&config.analyzer.output_csv, &filtered) {
        Ok(()) => println!("Results saved to {}", config.analyzer.output_csv),
        Err(e) => {
            log::error!("Failed to save filtered CSV: {:#}", e);
            println!("❌ Failed to save filtered CSV: {:#}", e);
        }
    }

    Ok(())
}
