use crate::types::AnalysisReport;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Render an analysis report as markdown
pub fn format_report_readable(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str(report.report_text().trim_end());
    output.push_str("\n\n");

    let captions = report.captions();
    if !captions.is_empty() {
        output.push_str("## Caption Timeline\n\n");
        for caption in captions {
            output.push_str(&format!(
                "• [{}] {}\n",
                format_timestamp(caption.start_secs),
                caption.text.trim()
            ));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaptionEntry;

    #[test]
    fn plain_report_is_passed_through() {
        let report = AnalysisReport::Plain {
            text: "## Diagnosis\nGood base.\n".into(),
        };
        assert_eq!(format_report_readable(&report), "## Diagnosis\nGood base.\n\n");
    }

    #[test]
    fn structured_report_lists_captions() {
        let report = AnalysisReport::Structured {
            captions: vec![CaptionEntry::from_raw("01:05", "Lost grip", 4.0)],
            report: "Report".into(),
        };
        let text = format_report_readable(&report);
        assert!(text.starts_with("Report\n\n## Caption Timeline"));
        assert!(text.contains("• [01:05] Lost grip"));
    }
}
