use std::io;

use csv::Writer;

use crate::core::error::Result;
use crate::core::test::IssueSeverity;
use crate::report::ReportGenerator;

const COLUMNS: usize = 6;

fn severity_to_string(severity: IssueSeverity) -> &'static str {
    match severity {
        IssueSeverity::Critical => "CRITICAL",
        IssueSeverity::High => "HIGH",
        IssueSeverity::Medium => "MEDIUM",
        IssueSeverity::Low => "LOW",
    }
}

fn row<'a>(cells: &[&'a str]) -> [&'a str; COLUMNS] {
    let mut record = [""; COLUMNS];
    for (slot, cell) in record.iter_mut().zip(cells) {
        *slot = *cell;
    }
    record
}

/// Spreadsheet export: test rows, then identification and summary blocks.
pub fn render(report: &ReportGenerator) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());

    writer
        .write_record(["Test", "Title", "Status", "Message", "Duration (ms)", "Issues"])
        .map_err(io::Error::from)?;

    for result in &report.results {
        let issues = result
            .issues
            .iter()
            .map(|issue| format!("[{}] {}", severity_to_string(issue.severity), issue.message))
            .collect::<Vec<_>>()
            .join("; ");

        writer
            .write_record([
                result.name.as_str(),
                result.title.as_str(),
                result.status.as_str(),
                result.message.as_str(),
                &result.duration.as_millis().to_string(),
                &issues,
            ])
            .map_err(io::Error::from)?;
    }

    writer.write_record(row(&[])).map_err(io::Error::from)?;

    let id = &report.identification;
    let date = id.date.format("%Y-%m-%d %H:%M:%S").to_string();
    let summary = &report.summary;
    let counts = [
        summary.total.to_string(),
        summary.passed.to_string(),
        summary.failed.to_string(),
        summary.partial.to_string(),
        summary.skipped.to_string(),
        format!("{:.2}", summary.success_rate),
    ];

    let records = [
        row(&["Technician", id.technician.as_deref().unwrap_or("")]),
        row(&["Workbench ID", id.workbench_id.as_deref().unwrap_or("")]),
        row(&["Date", &date]),
        row(&["Total tests", &counts[0]]),
        row(&["Passed", &counts[1]]),
        row(&["Failed", &counts[2]]),
        row(&["Partial", &counts[3]]),
        row(&["Skipped", &counts[4]]),
        row(&["Success rate (%)", &counts[5]]),
    ];
    for record in &records {
        writer.write_record(record).map_err(io::Error::from)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::*;

    #[test]
    fn test_csv_rows() {
        let results = results();
        let report = ReportGenerator::new(identification(), None, results.iter().collect());
        let text = render(&report).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(&rows[0][0], "tpm");
        assert_eq!(&rows[0][2], "PASS");
        assert_eq!(&rows[0][4], "420");
        assert_eq!(&rows[1][5], "[HIGH] No wireless network adapter is present");
        assert!(rows.iter().any(|r| &r[0] == "Workbench ID" && &r[1] == "WB-07"));
        assert!(rows.iter().any(|r| &r[0] == "Success rate (%)" && &r[1] == "50.00"));
    }
}
