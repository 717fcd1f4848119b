//! One report file per analysis turn

use crate::analysis::session::Exchange;
use crate::HarvestError;
use chrono::Local;
use std::path::{Path, PathBuf};

/// `<YYYYmmdd_HHMMSS>_turn_<NNN>_<label>.txt`
pub fn report_file_name(exchange: &Exchange) -> String {
    format!(
        "{}_turn_{:03}_{}.txt",
        exchange.at.with_timezone(&Local).format("%Y%m%d_%H%M%S"),
        exchange.turn,
        exchange.label()
    )
}

/// The manifest followed by the raw response or failure text
pub fn render_report(exchange: &Exchange) -> String {
    let mut body = String::from("Analyzed files:\n");
    for path in &exchange.manifest {
        body.push_str("- ");
        body.push_str(path);
        body.push('\n');
    }
    body.push_str("\nAnalysis:\n");
    body.push_str(exchange.outcome.text());
    body
}

/// Writes the report for one turn into `dir`
pub async fn write_report(dir: &Path, exchange: &Exchange) -> Result<PathBuf, HarvestError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report_file_name(exchange));
    tokio::fs::write(&path, render_report(exchange)).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::session::{Outcome, TurnKind};
    use chrono::Utc;
    use tempfile::TempDir;

    fn exchange(kind: TurnKind, outcome: Outcome) -> Exchange {
        Exchange {
            turn: 3,
            kind,
            manifest: vec!["downloaded_content/a.js".into(), "downloaded_content/b.js".into()],
            request: "ignored".into(),
            outcome,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_file_name() {
        let name = report_file_name(&exchange(TurnKind::Batch(2), Outcome::Success("ok".into())));
        assert!(name.ends_with("_turn_003_batch_2_analysis.txt"), "{}", name);
        assert_eq!(name.len(), "20240101_120000_turn_003_batch_2_analysis.txt".len());

        let name = report_file_name(&exchange(TurnKind::Summary, Outcome::Failure("x".into())));
        assert!(name.ends_with("_final_report_error.txt"));
    }

    #[test]
    fn test_render_report() {
        let report = render_report(&exchange(
            TurnKind::Batch(2),
            Outcome::Failure("Error during analysis: quota exceeded: later".into()),
        ));
        assert_eq!(
            report,
            "Analyzed files:\n- downloaded_content/a.js\n- downloaded_content/b.js\n\nAnalysis:\nError during analysis: quota exceeded: later"
        );
    }

    #[tokio::test]
    async fn test_write_report_creates_dir() {
        let dir = TempDir::new().unwrap();
        let reports = dir.path().join("ai_responses");
        let path = write_report(&reports, &exchange(TurnKind::Framing, Outcome::Success("ready".into())))
            .await
            .unwrap();
        assert!(path.starts_with(&reports));
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.ends_with("Analysis:\nready"));
    }
}
