use regex::Regex;

/// Numeric fields recovered from a free-text stats cell. Every field is
/// independently optional; a label that does not appear stays `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsFields {
    pub gpa: Option<f64>,
    pub gre_verbal: Option<f64>,
    pub gre_quant: Option<f64>,
    pub gre_writing: Option<f64>,
}

/// Expected shape of the value following a field label.
#[derive(Debug, Clone, Copy)]
enum NumberShape {
    /// Single digit, decimal point, one or more digits (e.g. "3.80").
    Decimal,
    /// One or more digits (e.g. "165").
    Integer,
}

impl NumberShape {
    fn pattern(self) -> &'static str {
        match self {
            NumberShape::Decimal => r"\d\.\d+",
            NumberShape::Integer => r"\d+",
        }
    }
}

/// Label anchors paired with the value shape each is expected to carry.
/// Example cell: "GPA: 3.80, GRE Verbal: 165, GRE Quantitative: 168,
/// GRE Analytical Writing: 4.50", though no fixed format is guaranteed.
const FIELD_SPECS: &[(&str, NumberShape)] = &[
    ("GPA", NumberShape::Decimal),
    ("GRE Verbal", NumberShape::Integer),
    ("GRE Quantitative", NumberShape::Integer),
    ("GRE Analytical Writing", NumberShape::Decimal),
];

/// Extract GPA and GRE subscores from an unstructured stats cell. Each field
/// is looked up independently; no cross-field validation is performed.
pub fn parse_stats(raw: &str) -> StatsFields {
    let mut values = FIELD_SPECS
        .iter()
        .map(|&(label, shape)| capture_field(raw, label, shape));

    StatsFields {
        gpa: values.next().flatten(),
        gre_verbal: values.next().flatten(),
        gre_quant: values.next().flatten(),
        gre_writing: values.next().flatten(),
    }
}

fn capture_field(raw: &str, label: &str, shape: NumberShape) -> Option<f64> {
    let pattern = format!(r"(?i){}[:\s]+({})", label, shape.pattern());
    let re = Regex::new(&pattern).unwrap();
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fully_populated_cell() {
        let fields = parse_stats(
            "GPA: 3.80, GRE Verbal: 165, GRE Quantitative: 168, GRE Analytical Writing: 4.50",
        );
        assert_eq!(fields.gpa, Some(3.80));
        assert_eq!(fields.gre_verbal, Some(165.0));
        assert_eq!(fields.gre_quant, Some(168.0));
        assert_eq!(fields.gre_writing, Some(4.50));
    }

    #[test]
    fn missing_labels_yield_none_never_zero() {
        let fields = parse_stats("GPA: 3.95");
        assert_eq!(fields.gpa, Some(3.95));
        assert_eq!(fields.gre_verbal, None);
        assert_eq!(fields.gre_quant, None);
        assert_eq!(fields.gre_writing, None);

        assert_eq!(parse_stats(""), StatsFields::default());
        assert_eq!(parse_stats("no scores reported"), StatsFields::default());
    }

    #[test]
    fn labels_match_case_insensitively() {
        let fields = parse_stats("gpa: 3.50, gre verbal: 158");
        assert_eq!(fields.gpa, Some(3.50));
        assert_eq!(fields.gre_verbal, Some(158.0));
    }

    #[test]
    fn whitespace_separators_are_accepted() {
        let fields = parse_stats("GPA 3.70 GRE Quantitative 170");
        assert_eq!(fields.gpa, Some(3.70));
        assert_eq!(fields.gre_quant, Some(170.0));
    }

    #[test]
    fn gpa_requires_decimal_shape() {
        // An integer after the GPA label does not match the decimal shape.
        let fields = parse_stats("GPA: 4");
        assert_eq!(fields.gpa, None);
    }

    #[test]
    fn fields_are_independent() {
        let fields = parse_stats("GRE Quantitative: 162, GPA: 3.10");
        assert_eq!(fields.gpa, Some(3.10));
        assert_eq!(fields.gre_quant, Some(162.0));
        assert_eq!(fields.gre_verbal, None);
    }

    #[test]
    fn verbal_label_does_not_satisfy_writing() {
        // "GRE Analytical Writing" must not borrow the verbal value.
        let fields = parse_stats("GRE Verbal: 160");
        assert_eq!(fields.gre_verbal, Some(160.0));
        assert_eq!(fields.gre_writing, None);
    }
}
