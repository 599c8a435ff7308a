use crate::models::AnalysisRecord;
use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use std::collections::BTreeMap;

/// Mean (rounded to two decimals) and non-null count of one numeric field
/// within a decision group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSummary {
    pub mean: Option<f64>,
    pub count: usize,
}

impl FieldSummary {
    pub fn display_mean(&self) -> String {
        match self.mean {
            Some(mean) => format!("{:.2}", mean),
            None => "-".to_string(),
        }
    }
}

/// Per-decision descriptive statistics over the filtered table.
#[derive(Debug, Clone)]
pub struct DecisionStats {
    pub decision: String,
    pub ugrad_gpa: FieldSummary,
    pub gre_verbal: FieldSummary,
    pub gre_quant: FieldSummary,
    pub gre_writing: FieldSummary,
}

/// Load the bulk dataset. Extra columns in the file are ignored.
pub fn load_records(path: &str) -> Result<Vec<AnalysisRecord>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("could not open {}", path))?;
    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: AnalysisRecord =
            result.with_context(|| format!("malformed row in {}", path))?;
        records.push(record);
    }
    Ok(records)
}

/// Case-insensitive substring filter on institution name and major. This is
/// deliberately not an exact match, so unrelated programs whose names contain
/// the search strings may slip through.
pub fn filter_records(
    records: &[AnalysisRecord],
    institution: &str,
    major: &str,
) -> Vec<AnalysisRecord> {
    let institution = institution.to_lowercase();
    let major = major.to_lowercase();
    records
        .iter()
        .filter(|r| {
            r.uni_name.to_lowercase().contains(&institution)
                && r.major.to_lowercase().contains(&major)
        })
        .cloned()
        .collect()
}

/// Full value-count breakdown of the decision field, most frequent first.
pub fn decision_counts(records: &[AnalysisRecord]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.decision.as_str()).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(decision, count)| (decision.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Group rows by decision and summarize the four numeric fields per group.
/// Groups come back in alphabetical decision order.
pub fn group_stats(records: &[AnalysisRecord]) -> Vec<DecisionStats> {
    let mut groups: BTreeMap<&str, Vec<&AnalysisRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.decision.as_str()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(decision, group)| DecisionStats {
            decision: decision.to_string(),
            ugrad_gpa: summarize(group.iter().filter_map(|r| r.ugrad_gpa)),
            gre_verbal: summarize(group.iter().filter_map(|r| r.gre_verbal)),
            gre_quant: summarize(group.iter().filter_map(|r| r.gre_quant)),
            gre_writing: summarize(group.iter().filter_map(|r| r.gre_writing)),
        })
        .collect()
}

fn summarize(values: impl Iterator<Item = f64>) -> FieldSummary {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return FieldSummary {
            mean: None,
            count: 0,
        };
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    FieldSummary {
        mean: Some(round2(mean)),
        count: values.len(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split of rows by GRE score-scale era (new scale vs old scale).
pub fn gre_era_counts(records: &[AnalysisRecord]) -> (usize, usize) {
    let new_scale = records.iter().filter(|r| r.is_new_gre == Some(true)).count();
    let old_scale = records.iter().filter(|r| r.is_new_gre == Some(false)).count();
    (new_scale, old_scale)
}

/// Write the filtered subset back out as CSV.
pub fn write_filtered_csv(path: &str, records: &[AnalysisRecord]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn decision_color(decision: &str, index: usize) -> RGBColor {
    let lower = decision.to_lowercase();
    if lower.contains("accept") {
        RGBColor(46, 139, 87)
    } else if lower.contains("reject") {
        RGBColor(178, 34, 34)
    } else if lower.contains("wait") {
        RGBColor(255, 140, 0)
    } else if lower.contains("interview") {
        RGBColor(65, 105, 225)
    } else {
        // Rotate a small fallback palette for anything unexpected.
        const FALLBACK: [RGBColor; 3] = [
            RGBColor(105, 105, 105),
            RGBColor(148, 0, 211),
            RGBColor(0, 139, 139),
        ];
        FALLBACK[index % FALLBACK.len()]
    }
}

/// Scatter plot of GRE verbal vs quantitative scores, one color and marker
/// per decision category, saved as a PNG. Rows missing either score are
/// excluded from the plot (they still appear in the CSV output).
pub fn plot_gre_scatter(records: &[AnalysisRecord], path: &str) -> Result<()> {
    let mut groups: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for record in records {
        if let (Some(verbal), Some(quant)) = (record.gre_verbal, record.gre_quant) {
            groups
                .entry(record.decision.as_str())
                .or_default()
                .push((verbal, quant));
        }
    }

    if groups.is_empty() {
        return Err(anyhow!("no rows with both GRE scores; nothing to plot"));
    }

    let points = groups.values().flatten();
    let x_min = points.clone().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = points.clone().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_min = points.clone().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = points.map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    // Pad the ranges so edge points are not drawn on the axes.
    let x_range = (x_min - 2.0)..(x_max + 2.0);
    let y_range = (y_min - 2.0)..(y_max + 2.0);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("failed to prepare drawing area: {}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("GRE Verbal vs Quantitative", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| anyhow!("failed to configure chart: {}", e))?;

    chart
        .configure_mesh()
        .x_desc("GRE Verbal")
        .y_desc("GRE Quantitative")
        .draw()
        .map_err(|e| anyhow!("failed to draw chart mesh: {}", e))?;

    for (index, (decision, points)) in groups.iter().enumerate() {
        let color = decision_color(decision, index);
        // Alternate marker shapes so overlapping categories stay readable.
        if index % 2 == 0 {
            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))
                .map_err(|e| anyhow!("failed to draw series {}: {}", decision, e))?
                .label(decision.to_string())
                .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
        } else {
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&p| TriangleMarker::new(p, 5, color.filled())),
                )
                .map_err(|e| anyhow!("failed to draw series {}: {}", decision, e))?
                .label(decision.to_string())
                .legend(move |(x, y)| TriangleMarker::new((x, y), 5, color.filled()));
        }
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|e| anyhow!("failed to draw legend: {}", e))?;

    root.present()
        .map_err(|e| anyhow!("failed to save plot to {}: {}", path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        uni_name: &str,
        major: &str,
        decision: &str,
        gpa: Option<f64>,
        verbal: Option<f64>,
        quant: Option<f64>,
        writing: Option<f64>,
    ) -> AnalysisRecord {
        AnalysisRecord {
            uni_name: uni_name.to_string(),
            major: major.to_string(),
            decision: decision.to_string(),
            ugrad_gpa: gpa,
            gre_verbal: verbal,
            gre_quant: quant,
            gre_writing: writing,
            is_new_gre: Some(true),
        }
    }

    fn sample() -> Vec<AnalysisRecord> {
        vec![
            record(
                "Yale University",
                "Political Science",
                "Accepted",
                Some(3.8),
                Some(165.0),
                Some(168.0),
                Some(4.5),
            ),
            record(
                "YALE UNIVERSITY",
                "political science",
                "Accepted",
                Some(3.6),
                Some(161.0),
                None,
                Some(4.0),
            ),
            record(
                "Yale University",
                "Political Science And Government",
                "Rejected",
                Some(3.2),
                Some(155.0),
                Some(150.0),
                None,
            ),
            record(
                "Harvard University",
                "Political Science",
                "Accepted",
                Some(4.0),
                Some(170.0),
                Some(170.0),
                Some(5.0),
            ),
            record(
                "Yale University",
                "History",
                "Rejected",
                Some(3.5),
                Some(160.0),
                Some(160.0),
                Some(4.0),
            ),
        ]
    }

    #[test]
    fn filter_is_case_insensitive_substring_match() {
        let filtered = filter_records(&sample(), "Yale", "Political Science");
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|r| r.uni_name.to_lowercase().contains("yale")));
        // Substring match keeps the "And Government" variant.
        assert!(filtered
            .iter()
            .any(|r| r.major == "Political Science And Government"));
    }

    #[test]
    fn decision_counts_sorted_by_frequency() {
        let filtered = filter_records(&sample(), "Yale", "Political Science");
        let counts = decision_counts(&filtered);
        assert_eq!(counts, vec![("Accepted".to_string(), 2), ("Rejected".to_string(), 1)]);
    }

    #[test]
    fn group_stats_mean_and_count_per_decision() {
        let filtered = filter_records(&sample(), "Yale", "Political Science");
        let stats = group_stats(&filtered);
        assert_eq!(stats.len(), 2);

        let accepted = &stats[0];
        assert_eq!(accepted.decision, "Accepted");
        assert_eq!(accepted.ugrad_gpa.mean, Some(3.7));
        assert_eq!(accepted.ugrad_gpa.count, 2);
        assert_eq!(accepted.gre_verbal.mean, Some(163.0));
        // One accepted row has no quant score; count excludes it.
        assert_eq!(accepted.gre_quant.count, 1);
        assert_eq!(accepted.gre_quant.mean, Some(168.0));

        let rejected = &stats[1];
        assert_eq!(rejected.decision, "Rejected");
        assert_eq!(rejected.gre_writing.count, 0);
        assert_eq!(rejected.gre_writing.mean, None);
        assert_eq!(rejected.gre_writing.display_mean(), "-");
    }

    #[test]
    fn means_are_rounded_to_two_decimals() {
        let records = vec![
            record("Yale", "Political Science", "Accepted", Some(3.333), None, None, None),
            record("Yale", "Political Science", "Accepted", Some(3.0), None, None, None),
        ];
        let stats = group_stats(&records);
        assert_eq!(stats[0].ugrad_gpa.mean, Some(3.17));
        assert_eq!(stats[0].ugrad_gpa.display_mean(), "3.17");
    }

    #[test]
    fn era_counts_split_on_flag() {
        let mut records = sample();
        records[0].is_new_gre = Some(false);
        records[1].is_new_gre = None;
        let (new_scale, old_scale) = gre_era_counts(&records);
        assert_eq!(new_scale, 3);
        assert_eq!(old_scale, 1);
    }

    #[test]
    fn plot_rejects_empty_input() {
        let records = vec![record(
            "Yale University",
            "Political Science",
            "Accepted",
            Some(3.8),
            None,
            None,
            None,
        )];
        let path = std::env::temp_dir().join("gradstat_empty_plot.png");
        let result = plot_gre_scatter(&records, path.to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    #[ignore = "font rendering not available in headless test environments"]
    fn plot_writes_png() {
        let path = std::env::temp_dir().join("gradstat_test_plot.png");
        let _ = std::fs::remove_file(&path);
        plot_gre_scatter(&sample(), path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn filtered_csv_round_trip() {
        let dir = std::env::temp_dir().join("gradstat_test_analyzer");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("filtered.csv");

        let filtered = filter_records(&sample(), "Yale", "Political Science");
        write_filtered_csv(path.to_str().unwrap(), &filtered).unwrap();

        let reloaded = load_records(path.to_str().unwrap()).unwrap();
        assert_eq!(reloaded.len(), filtered.len());
        assert_eq!(reloaded[0].uni_name, filtered[0].uni_name);
        assert_eq!(reloaded[0].ugrad_gpa, filtered[0].ugrad_gpa);
        std::fs::remove_file(&path).ok();
    }
}
