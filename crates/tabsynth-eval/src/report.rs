use crate::metrics::ValidationReport;

/// Render a deterministic markdown summary of validation reports.
pub fn render_report(reports: &[ValidationReport], seed: Option<u64>, max_examples: usize) -> String {
    let mut lines = Vec::new();

    lines.push("# tabsynth Validation Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    if let Some(seed) = seed {
        lines.push(format!("- seed: {seed}"));
    }
    lines.push(format!("- tables: {}", reports.len()));
    lines.push(format!(
        "- valid: {}",
        reports.iter().filter(|report| report.is_valid).count()
    ));
    lines.push(String::new());

    lines.push("## Tables".to_string());
    lines.push("| table | rows_expected | rows_found | valid | violations | warnings |".to_string());
    lines.push("| --- | --- | --- | --- | --- | --- |".to_string());
    for report in reports {
        let expected = report
            .expected_rows
            .map(|value| value.to_string())
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            report.table,
            expected,
            report.row_count,
            if report.is_valid { "yes" } else { "no" },
            report.violations.len(),
            report.warnings.len()
        ));
    }
    lines.push(String::new());

    for report in reports {
        lines.push(format!("## {}", report.table));
        lines.push("| column | kind | null_rate | distinct | mean | std_dev | checks | status |".to_string());
        lines.push("| --- | --- | --- | --- | --- | --- | --- | --- |".to_string());
        for column in &report.columns {
            let passed = column.checks.iter().filter(|check| check.passed).count();
            lines.push(format!(
                "| {} | {} | {:.4} | {} | {} | {} | {}/{} | {} |",
                column.column,
                column.kind,
                column.observed.null_rate(),
                column.observed.distinct,
                format_stat(column.observed.mean),
                format_stat(column.observed.std_dev),
                passed,
                column.checks.len(),
                if column.passed { "pass" } else { "FAIL" }
            ));
        }
        lines.push(String::new());

        let described: Vec<_> = report
            .columns
            .iter()
            .filter_map(|column| column.description.as_ref().map(|text| (&column.column, text)))
            .collect();
        if !described.is_empty() {
            for (column, text) in described {
                lines.push(format!("- `{column}`: {text}"));
            }
            lines.push(String::new());
        }

        if !report.violations.is_empty() {
            lines.push("### Violations".to_string());
            for violation in report.violations.iter().take(max_examples) {
                let row = violation
                    .row_index
                    .map(|row| format!(" row {row}"))
                    .unwrap_or_default();
                let example = violation
                    .example
                    .as_ref()
                    .map(|value| format!(" example={value}"))
                    .unwrap_or_default();
                lines.push(format!(
                    "- [{}] {}{}: {}{}",
                    violation.code, violation.path, row, violation.message, example
                ));
            }
            lines.push(String::new());
        }

        if !report.warnings.is_empty() {
            lines.push("### Warnings".to_string());
            for warning in &report.warnings {
                let hint = warning
                    .hint
                    .as_ref()
                    .map(|hint| format!(" (hint: {hint})"))
                    .unwrap_or_default();
                lines.push(format!("- {}: {}{}", warning.path, warning.message, hint));
            }
            lines.push(String::new());
        }

        if report.omitted_findings > 0 {
            lines.push(format!(
                "_{} more finding(s) omitted; raise max_examples to list them._",
                report.omitted_findings
            ));
            lines.push(String::new());
        }
    }

    lines.push("## Recommendations".to_string());
    lines.extend(recommendations(reports));
    lines.join("\n")
}

fn format_stat(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.3}"))
        .unwrap_or_else(|| "-".to_string())
}

fn recommendations(reports: &[ValidationReport]) -> Vec<String> {
    let codes: Vec<&str> = reports
        .iter()
        .flat_map(|report| report.violations.iter().map(|violation| violation.code.as_str()))
        .collect();
    let warnings: Vec<&str> = reports
        .iter()
        .flat_map(|report| report.warnings.iter().map(|warning| warning.code.as_str()))
        .collect();

    let mut lines = Vec::new();
    if codes.contains(&"statistical_deviation") {
        lines.push(
            "- increase the row count or widen tolerances for columns with deviations.".to_string(),
        );
    }
    if codes.contains(&"duplicate_key") || codes.contains(&"distinct_count") {
        lines.push("- check key ranges and distinct_count against requested rows.".to_string());
    }
    if codes.contains(&"dangling_reference") {
        lines.push("- generate referenced tables in the same run as their dependents.".to_string());
    }
    if codes.contains(&"row_count") {
        lines.push("- inspect the generation report for failed or cancelled tables.".to_string());
    }
    if warnings.contains(&"null_rate_conflict") {
        lines.push("- reconcile nullable:false columns that declare a null percentage.".to_string());
    }
    if codes.is_empty() {
        lines.push("- no violations detected; compare reports across seeds for drift.".to_string());
    }
    lines
}
