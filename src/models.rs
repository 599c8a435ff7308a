use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub query: QueryConfig,
    pub filter: FilterConfig,
    pub collector: CollectorConfig,
    pub analyzer: AnalyzerConfig,
}

/// Query-string parameters sent to the survey listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub institution: String,
    pub program: String,
    pub degree: String,
    pub season: String,
    pub sort: String,
}

/// Substrings a scraped row must contain to be kept. Intentionally looser
/// than the query values, since the listing also returns near-miss programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub institution: String,
    pub program: String,
    pub degree: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub webdriver_url: String,
    pub user_agent: String,
    pub start_page: u32,
    pub end_page: u32,
    pub page_load_delay_secs: u64,
    pub request_delay_secs: u64,
    pub output_csv: String,
    pub snapshot_dir: String,
    pub log_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub input_csv: String,
    pub institution_filter: String,
    pub major_filter: String,
    pub output_csv: String,
    pub plot_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query: QueryConfig {
                institution: "Yale University".to_string(),
                program: "Political Science".to_string(),
                degree: "PhD".to_string(),
                season: "".to_string(),
                sort: "newest".to_string(),
            },
            filter: FilterConfig {
                institution: "Yale".to_string(),
                program: "Political Science".to_string(),
                degree: "PhD".to_string(),
            },
            collector: CollectorConfig {
                webdriver_url: "http://localhost:9515".to_string(),
                user_agent: "GradStatDataCollector/1.0".to_string(),
                start_page: 1,
                end_page: 170,
                page_load_delay_secs: 5,
                request_delay_secs: 2,
                output_csv: "yale_polisci_recent.csv".to_string(),
                snapshot_dir: "snapshots".to_string(),
                log_file: "fetch_data.log".to_string(),
            },
            analyzer: AnalyzerConfig {
                input_csv: "all/all.csv".to_string(),
                institution_filter: "Yale".to_string(),
                major_filter: "Political Science".to_string(),
                output_csv: "yale_polisci_results.csv".to_string(),
                plot_file: "yale_gre_scores.png".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// One self-reported admissions result scraped from the listing. Numeric
/// fields stay optional until imputation fills them; `stats_raw` keeps the
/// original unparsed cell for auditing.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedRecord {
    pub institution: String,
    pub program: String,
    pub degree: String,
    pub season: String,
    pub decision: String,
    pub gpa: Option<f64>,
    pub gre_verbal: Option<f64>,
    pub gre_quant: Option<f64>,
    pub gre_writing: Option<f64>,
    pub stats_raw: String,
}

/// One row of the externally supplied bulk dataset. The source file carries
/// many more columns; only these are read, the rest are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub uni_name: String,
    pub major: String,
    pub decision: String,
    pub ugrad_gpa: Option<f64>,
    pub gre_verbal: Option<f64>,
    pub gre_quant: Option<f64>,
    pub gre_writing: Option<f64>,
    #[serde(deserialize_with = "deserialize_flag", default)]
    pub is_new_gre: Option<bool>,
}

/// The bulk dataset encodes the score-scale flag inconsistently (0/1,
/// true/false, sometimes empty).
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.trim().to_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(true),
        "0" | "0.0" | "false" => Some(false),
        _ => None,
    }))
}

/// Map a raw decision label to its canonical category. Unmapped labels become
/// "Unknown" rather than being dropped or passed through.
pub fn normalize_decision(raw: &str) -> &'static str {
    match raw {
        "Accepted" => "Accept",
        "Rejected" => "Reject",
        "Wait Listed" => "Waitlist",
        "Interview" => "Other",
        "Other" => "Other",
        _ => "Unknown",
    }
}
