use crate::models::{normalize_decision, CollectorConfig, FilterConfig, ScrapedRecord};
use crate::scraper::{extract_page, PageContent, PageSource};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// Why the pagination loop stopped. Empty pages, missing tables and fetch
/// failures all terminate the loop, but the caller can tell them apart
/// instead of silently conflating "no more results" with "scrape broke".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page rendered its table but yielded zero qualifying rows.
    EmptyPage(u32),
    /// The expected results table was absent from the markup.
    MissingTable(u32),
    /// The page could not be fetched at all.
    FetchError(u32),
    /// Every page up to the configured bound produced rows.
    EndBound,
}

#[derive(Debug)]
pub struct CollectOutcome {
    pub records: Vec<ScrapedRecord>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

/// Request pages in increasing order, extracting qualifying rows from each,
/// until a page yields nothing or the end bound is reached. A fixed delay
/// separates successive requests.
pub async fn collect_pages<S: PageSource>(
    source: &mut S,
    config: &CollectorConfig,
    filter: &FilterConfig,
) -> CollectOutcome {
    let mut records = Vec::new();
    let mut pages_fetched = 0;
    let mut stop = StopReason::EndBound;
    let request_delay = Duration::from_secs(config.request_delay_secs);

    for page in config.start_page..=config.end_page {
        log::info!("Starting data fetch for page {}", page);

        let html = match source.fetch_page(page).await {
            Ok(html) => html,
            Err(e) => {
                log::error!("Error scraping page {}: {:#}", page, e);
                stop = StopReason::FetchError(page);
                break;
            }
        };
        pages_fetched += 1;

        let page_records = match extract_page(&html, filter) {
            PageContent::Table(page_records) => page_records,
            PageContent::NoTable => {
                log::warn!("No results table found on page {}", page);
                save_snapshot(&config.snapshot_dir, page, &html);
                stop = StopReason::MissingTable(page);
                break;
            }
        };

        if page_records.is_empty() {
            log::info!("No results found on page {}. Assuming no more pages to scrape.", page);
            stop = StopReason::EmptyPage(page);
            break;
        }

        log::info!("Page {}: fetched {} entries", page, page_records.len());
        records.extend(page_records);
        log::info!(
            "Completed data fetch for page {}. Total entries collected so far: {}",
            page,
            records.len()
        );

        // Respectful delay between requests.
        tokio::time::sleep(request_delay).await;
    }

    match stop {
        StopReason::EndBound => log::info!("Reached configured end page {}", config.end_page),
        StopReason::EmptyPage(page) => log::info!("Stopped at empty page {}", page),
        StopReason::MissingTable(page) => {
            log::warn!("Stopped at page {} with no results table; treating as end of data", page)
        }
        StopReason::FetchError(page) => {
            log::warn!("Stopped at page {} after a fetch error; result set may be truncated", page)
        }
    }

    CollectOutcome {
        records,
        pages_fetched,
        stop,
    }
}

/// Save the rendered markup of a problem page for offline inspection. Never
/// fatal; a failed snapshot only logs.
fn save_snapshot(snapshot_dir: &str, page: u32, html: &str) {
    let dir = Path::new(snapshot_dir);
    let path = dir.join(format!("page_source_page{}.html", page));
    let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, html));
    match result {
        Ok(()) => log::info!("Saved page source to {} for manual inspection", path.display()),
        Err(e) => log::error!("Failed to save page snapshot {}: {}", path.display(), e),
    }
}

/// Rewrite raw decisions to canonical categories and fill missing numeric
/// fields: GPA with the column mean, each GRE subscore with the column
/// median, both computed over this collected table. Running it again on the
/// resulting fully-populated table changes nothing.
pub fn normalize_records(records: &mut [ScrapedRecord]) {
    for record in records.iter_mut() {
        record.decision = normalize_decision(&record.decision).to_string();
    }

    let gpa_mean = mean(records.iter().filter_map(|r| r.gpa));
    fill_missing(records, gpa_mean, |r| &mut r.gpa);

    let verbal_median = median(records.iter().filter_map(|r| r.gre_verbal));
    fill_missing(records, verbal_median, |r| &mut r.gre_verbal);

    let quant_median = median(records.iter().filter_map(|r| r.gre_quant));
    fill_missing(records, quant_median, |r| &mut r.gre_quant);

    let writing_median = median(records.iter().filter_map(|r| r.gre_writing));
    fill_missing(records, writing_median, |r| &mut r.gre_writing);
}

fn fill_missing<F>(records: &mut [ScrapedRecord], value: Option<f64>, field: F)
where
    F: Fn(&mut ScrapedRecord) -> &mut Option<f64>,
{
    // A column with no observed values stays missing.
    let Some(value) = value else { return };
    for record in records.iter_mut() {
        let slot = field(record);
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Write the collected table as CSV with a header row; missing numeric
/// fields serialize as empty cells.
pub fn write_records_csv(path: &str, records: &[ScrapedRecord]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
