use crate::model::Section;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;

pub const REPORT_TITLE: &str = "EDUTRACK REPORT";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub student_name: String,
    /// One cell per session column: `P`, `A` or empty.
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub section_name: String,
    pub subject: String,
    /// Session keys in the order they were saved.
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
}

/// Read-side projection of a section's history: one row per current student
/// (alphabetical), one column per saved session.
pub fn attendance_report(section: &Section) -> AttendanceReport {
    let columns: Vec<String> = section.history.keys().map(str::to_string).collect();
    let rows = section
        .sorted_students()
        .into_iter()
        .map(|student| ReportRow {
            student_name: student.name.clone(),
            cells: section
                .history
                .iter()
                .map(|(_, node)| {
                    node.data
                        .get(&student.id)
                        .map(|s| s.report_code().to_string())
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect();
    AttendanceReport {
        section_name: section.name.clone(),
        subject: section.subject.clone(),
        columns,
        rows,
    }
}

impl AttendanceReport {
    /// Sheet layout: title, section line, blank line, header, student rows.
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        let mut grid: Vec<Vec<String>> = Vec::with_capacity(self.rows.len() + 4);
        grid.push(vec![REPORT_TITLE.to_string()]);
        grid.push(vec![
            "Section:".to_string(),
            self.section_name.clone(),
            String::new(),
            "Subject:".to_string(),
            self.subject.clone(),
        ]);
        grid.push(Vec::new());

        let mut header = vec!["Student Name".to_string()];
        header.extend(self.columns.iter().cloned());
        grid.push(header);

        for row in &self.rows {
            let mut line = vec![row.student_name.clone()];
            line.extend(row.cells.iter().cloned());
            grid.push(line);
        }
        grid
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        for line in self.to_grid() {
            let fields: Vec<String> = line.iter().map(|f| csv_quote(f)).collect();
            csv.push_str(&fields.join(","));
            csv.push('\n');
        }
        csv
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn default_file_name(section: &Section) -> String {
    let safe: String = section
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("EduTrack_{}.csv", safe)
}

pub fn write_csv(report: &AttendanceReport, out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(out, report.to_csv())
        .with_context(|| format!("failed to write {}", out.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> Section {
        let text = r#"{
            "id": "k1", "name": "8D, period 2", "subject": "Math",
            "students": [
              { "id": "s2", "name": "bob", "status": "present" },
              { "id": "s1", "name": "Ann", "status": null }
            ],
            "history": {
              "Sep 3, 9:00 AM": { "s1": "present", "s2": "absent", "gone": "present" },
              "Sep 4, 9:01 AM": { "data": { "s1": "absent" }, "modCount": 1, "timestamp": 1757000000000 }
            },
            "isLocked": false
        }"#;
        serde_json::from_str(text).expect("section")
    }

    #[test]
    fn report_rows_are_alphabetical_and_columns_in_save_order() {
        let report = attendance_report(&section());
        assert_eq!(report.columns, vec!["Sep 3, 9:00 AM", "Sep 4, 9:01 AM"]);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].student_name, "Ann");
        assert_eq!(report.rows[0].cells, vec!["P", "A"]);
        assert_eq!(report.rows[1].student_name, "bob");
        assert_eq!(report.rows[1].cells, vec!["A", ""]);
    }

    #[test]
    fn live_statuses_do_not_leak_into_report() {
        let report = attendance_report(&section());
        // bob is present on the live board but has no entry in the second session.
        assert_eq!(report.rows[1].cells[1], "");
    }

    #[test]
    fn csv_has_preamble_and_quotes_commas() {
        let csv = attendance_report(&section()).to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], REPORT_TITLE);
        assert_eq!(lines[1], "Section:,\"8D, period 2\",,Subject:,Math");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "Student Name,\"Sep 3, 9:00 AM\",\"Sep 4, 9:01 AM\"");
        assert_eq!(lines[4], "Ann,P,A");
        assert_eq!(lines[5], "bob,A,");
    }

    #[test]
    fn file_name_is_filesystem_safe() {
        assert_eq!(default_file_name(&section()), "EduTrack_8D__period_2.csv");
    }
}
