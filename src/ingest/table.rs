/// Per-column summaries of tabular data
use super::{CATEGORICAL_ANALYSIS, NUMERICAL_ANALYSIS};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Categorical,
    Numerical,
}

impl ColumnKind {
    pub fn metadata_type(self) -> &'static str {
        match self {
            ColumnKind::Categorical => CATEGORICAL_ANALYSIS,
            ColumnKind::Numerical => NUMERICAL_ANALYSIS,
        }
    }
}

/// Summarize one column; `None` when it has no non-empty values
///
/// A column is numerical only if every non-empty value parses as a finite number.
pub fn summarize_column(
    dataset: &str,
    column: &str,
    values: &[String],
    top_values: usize,
) -> Option<(String, ColumnKind)> {
    let present: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if present.is_empty() {
        return None;
    }

    let numbers: Option<Vec<f64>> = present
        .iter()
        .map(|v| v.parse::<f64>().ok().filter(|n| n.is_finite()))
        .collect();

    Some(match numbers {
        Some(numbers) => (
            describe_numbers(dataset, column, &numbers),
            ColumnKind::Numerical,
        ),
        None => (
            describe_categories(dataset, column, &present, top_values),
            ColumnKind::Categorical,
        ),
    })
}

fn describe_numbers(dataset: &str, column: &str, numbers: &[f64]) -> String {
    let n = numbers.len() as f64;
    let mean = numbers.iter().sum::<f64>() / n;
    // Sample standard deviation; a single value has no spread
    let std = if numbers.len() > 1 {
        (numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    format!(
        "In {}, {} has mean {:.2}, std {:.2}, range {:.2}-{:.2}",
        dataset, column, mean, std, min, max
    )
}

fn describe_categories(dataset: &str, column: &str, values: &[&str], top_values: usize) -> String {
    // (count, first index) per distinct value
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, value) in values.iter().enumerate() {
        counts.entry(*value).or_insert((0, i)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(value, (count, first))| (value, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let shown = ranked
        .iter()
        .take(top_values)
        .map(|(value, count, _)| format!("{}: {}", value, count))
        .collect::<Vec<_>>()
        .join(", ");

    format!("In {}, column {} shows: {{{}}}", dataset, column, shown)
}
