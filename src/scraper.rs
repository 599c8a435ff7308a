use crate::models::{CollectorConfig, FilterConfig, QueryConfig, ScrapedRecord};
use crate::stats::parse_stats;
use anyhow::{Context, Result};
use scraper::{Html, Selector};
use std::time::Duration;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use url::Url;

const SURVEY_BASE_URL: &str = "https://www.thegradcafe.com/survey/";

/// Minimum number of cells a result row must have; anything shorter is
/// malformed and skipped.
const MIN_ROW_CELLS: usize = 7;

/// Anything that can produce the rendered HTML of a listing page. The
/// production implementation drives a browser; tests substitute canned pages.
pub trait PageSource {
    async fn fetch_page(&mut self, page: u32) -> Result<String>;
}

/// A headless Chrome session reached over a remote WebDriver endpoint.
///
/// thirtyfour requires an explicit async `quit`, so the session is closed by
/// consuming it with [`BrowserSession::close`]; callers run the whole
/// collection loop first, close, and only then propagate the loop's error.
pub struct BrowserSession {
    driver: WebDriver,
    query: QueryConfig,
    page_load_delay: Duration,
}

impl BrowserSession {
    pub async fn start(config: &CollectorConfig, query: QueryConfig) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless()?;
        caps.set_no_sandbox()?;
        caps.set_disable_dev_shm_usage()?;
        caps.add_arg("--window-size=1920,1080")?;
        caps.add_arg(&format!("--user-agent={}", config.user_agent))?;

        let driver = WebDriver::new(&config.webdriver_url, caps)
            .await
            .with_context(|| {
                format!(
                    "failed to start WebDriver session at {} (is chromedriver running?)",
                    config.webdriver_url
                )
            })?;
        log::info!("WebDriver session started at {}", config.webdriver_url);

        Ok(Self {
            driver,
            query,
            page_load_delay: Duration::from_secs(config.page_load_delay_secs),
        })
    }

    pub async fn close(self) -> Result<()> {
        self.driver.quit().await.context("failed to quit WebDriver session")?;
        log::info!("WebDriver session closed");
        Ok(())
    }
}

impl PageSource for BrowserSession {
    async fn fetch_page(&mut self, page: u32) -> Result<String> {
        let url = page_url(&self.query, page);
        log::info!("Fetching page {}: {}", page, url);
        self.driver
            .goto(&url)
            .await
            .with_context(|| format!("failed to load page {}", page))?;
        // Let client-side rendering settle before reading the DOM.
        tokio::time::sleep(self.page_load_delay).await;
        let source = self
            .driver
            .source()
            .await
            .with_context(|| format!("failed to read page source for page {}", page))?;
        Ok(source)
    }
}

/// Build the listing URL for one page of the fixed query.
pub fn page_url(query: &QueryConfig, page: u32) -> String {
    let url = Url::parse_with_params(
        SURVEY_BASE_URL,
        &[
            ("q", ""),
            ("sort", query.sort.as_str()),
            ("institution", query.institution.as_str()),
            ("program", query.program.as_str()),
            ("degree", query.degree.as_str()),
            ("season", query.season.as_str()),
            ("page", &page.to_string()),
        ],
    )
    .expect("survey base URL is valid");
    url.into()
}

/// Outcome of extracting one rendered page.
#[derive(Debug)]
pub enum PageContent {
    /// The results table was present; rows may still be empty.
    Table(Vec<ScrapedRecord>),
    /// No results table in the markup at all.
    NoTable,
}

/// Pull qualifying rows out of a rendered listing page.
///
/// Rows with fewer than [`MIN_ROW_CELLS`] cells are skipped as malformed, and
/// only rows whose institution, program and degree contain all three filter
/// substrings (case-sensitive) are kept.
pub fn extract_page(html: &str, filter: &FilterConfig) -> PageContent {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table.submission-table").unwrap();

    let table = match document.select(&table_selector).next() {
        Some(table) => table,
        None => return PageContent::NoTable,
    };

    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let mut records = Vec::new();

    // First row is the header.
    for row in table.select(&row_selector).skip(1) {
        let cells: Vec<_> = row.select(&cell_selector).collect();

        if cells.len() < MIN_ROW_CELLS {
            continue; // Incomplete row
        }

        let cell_text = |index: usize| -> String {
            cells[index].text().collect::<String>().trim().to_string()
        };

        let institution = cell_text(0);
        let program = cell_text(1);
        let degree = cell_text(2);
        let season = cell_text(3);
        let decision = cell_text(4);
        let stats_raw = cell_text(6);

        if !(institution.contains(&filter.institution)
            && program.contains(&filter.program)
            && degree.contains(&filter.degree))
        {
            continue;
        }

        let stats = parse_stats(&stats_raw);

        records.push(ScrapedRecord {
            institution,
            program,
            degree,
            season,
            decision,
            gpa: stats.gpa,
            gre_verbal: stats.gre_verbal,
            gre_quant: stats.gre_quant,
            gre_writing: stats.gre_writing,
            stats_raw,
        });
    }

    PageContent::Table(records)
}
