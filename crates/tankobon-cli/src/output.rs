//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tankobon_client::{Series, SeriesMetadata};
use tankobon_session::SessionIdentity;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// Identity summary printed by `whoami`.
#[derive(Debug, Serialize)]
pub(crate) struct IdentityView<'a> {
    pub(crate) username: Option<&'a str>,
    pub(crate) is_admin: bool,
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

impl<'a> IdentityView<'a> {
    pub(crate) fn new(identity: &'a SessionIdentity, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            username: identity.username.as_deref(),
            is_admin: identity.is_admin,
            expires_at,
        }
    }
}

/// Metadata lookup result keyed by the id the user asked for.
#[derive(Debug, Serialize)]
pub(crate) struct MetadataView<'a> {
    pub(crate) external_id: &'a str,
    pub(crate) metadata: Option<&'a SeriesMetadata>,
}

pub(crate) fn render_series_list(series: &[Series], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(&series)?),
        OutputFormat::Table => print!("{}", series_table(series)),
    }
    Ok(())
}

pub(crate) fn render_series(series: &Series, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(series)?),
        OutputFormat::Table => print!("{}", series_detail(series)),
    }
    Ok(())
}

pub(crate) fn render_identity(view: &IdentityView<'_>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(view)?),
        OutputFormat::Table => print!("{}", identity_text(view)),
    }
    Ok(())
}

pub(crate) fn render_metadata(views: &[MetadataView<'_>], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(&views)?),
        OutputFormat::Table => print!("{}", metadata_table(views)),
    }
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn series_table(series: &[Series]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6} {:<32} {:>7} {:<4} {:>5} TAGS",
        "ID", "TITLE", "OWNED", "DONE", "SCORE"
    );
    for entry in series {
        let owned = format!("{}/{}", entry.owned_volumes(), entry.total_volumes);
        let _ = writeln!(
            out,
            "{:>6} {:<32} {:>7} {:<4} {:>5} {}",
            entry.id,
            truncate(&entry.title, 32),
            owned,
            yes_no(entry.completed),
            format_score(entry.score),
            entry.tags.join(", ")
        );
    }
    if series.is_empty() {
        out.push_str("(no series)\n");
    }
    out
}

pub(crate) fn series_detail(series: &Series) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "id: {}", series.id);
    let _ = writeln!(out, "title: {}", series.title);
    let _ = writeln!(
        out,
        "owned: {}/{}",
        series.owned_volumes(),
        series.total_volumes
    );
    let _ = writeln!(out, "complete: {}", yes_no(series.completed));
    let _ = writeln!(out, "score: {}", format_score(series.score));
    if !series.tags.is_empty() {
        let _ = writeln!(out, "tags: {}", series.tags.join(", "));
    }
    if !series.volumes.is_empty() {
        out.push_str("volumes:\n");
        for volume in &series.volumes {
            let _ = writeln!(
                out,
                "  #{:<4} {} (volume id {})",
                volume.volume_number,
                if volume.owned { "owned" } else { "missing" },
                volume.id
            );
        }
    }
    out
}

pub(crate) fn identity_text(view: &IdentityView<'_>) -> String {
    let Some(username) = view.username else {
        return "not signed in\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "user: {username}");
    let _ = writeln!(out, "admin: {}", yes_no(view.is_admin));
    if let Some(expires_at) = view.expires_at {
        let _ = writeln!(out, "expires: {}", expires_at.to_rfc3339());
    }
    out
}

pub(crate) fn metadata_table(views: &[MetadataView<'_>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>5} GENRES", "EXTERNAL ID", "SCORE");
    for view in views {
        match view.metadata {
            Some(metadata) => {
                let _ = writeln!(
                    out,
                    "{:<12} {:>5} {}",
                    view.external_id,
                    format_score(metadata.score),
                    metadata.genres.join(", ")
                );
            }
            None => {
                let _ = writeln!(out, "{:<12} {:>5} (not found)", view.external_id, "-");
            }
        }
    }
    out
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |value| format!("{value:.1}"))
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(width.saturating_sub(1)).collect();
    shortened.push('~');
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;
    use tankobon_client::Volume;

    fn series(id: i64, title: &str, owned: &[bool]) -> Series {
        Series {
            id,
            title: title.to_string(),
            total_volumes: u32::try_from(owned.len()).unwrap(),
            completed: false,
            score: Some(8.25),
            tags: vec!["seinen".into(), "classic".into()],
            volumes: owned
                .iter()
                .zip(1..)
                .map(|(owned, number)| Volume {
                    id: id * 100 + i64::from(number),
                    volume_number: number,
                    owned: *owned,
                })
                .collect(),
        }
    }

    #[test]
    fn table_lists_ownership_and_tags() {
        let table = series_table(&[series(7, "Vinland Saga", &[true, true, false])]);
        let mut lines = table.lines();
        assert!(lines.next().unwrap().contains("TITLE"));
        let row = lines.next().unwrap();
        assert!(row.contains("Vinland Saga"));
        assert!(row.contains("2/3"));
        assert!(row.contains("8.2") || row.contains("8.3"));
        assert!(row.ends_with("seinen, classic"));
    }

    #[test]
    fn empty_table_says_so() {
        assert!(series_table(&[]).ends_with("(no series)\n"));
    }

    #[test]
    fn long_titles_are_truncated() {
        let title = "A".repeat(40);
        let shortened = truncate(&title, 32);
        assert_eq!(shortened.chars().count(), 32);
        assert!(shortened.ends_with('~'));
        assert_eq!(truncate("short", 32), "short");
    }

    #[test]
    fn detail_lists_each_volume() {
        let text = series_detail(&series(3, "Monster", &[true, false]));
        assert!(text.contains("owned: 1/2"));
        assert!(text.contains("#1    owned (volume id 301)"));
        assert!(text.contains("#2    missing (volume id 302)"));
    }

    #[test]
    fn identity_text_handles_signed_out() {
        let neutral = SessionIdentity::neutral();
        assert_eq!(
            identity_text(&IdentityView::new(&neutral, None)),
            "not signed in\n"
        );
        let admin = SessionIdentity {
            username: Some("root".into()),
            is_admin: true,
        };
        let text = identity_text(&IdentityView::new(&admin, None));
        assert_eq!(text, "user: root\nadmin: yes\n");
    }

    #[test]
    fn metadata_table_marks_missing_entries() {
        let found = SeriesMetadata {
            score: Some(9.0),
            genres: vec!["Drama".into()],
        };
        let table = metadata_table(&[
            MetadataView {
                external_id: "1",
                metadata: Some(&found),
            },
            MetadataView {
                external_id: "2",
                metadata: None,
            },
        ]);
        assert!(table.contains("9.0 Drama"));
        assert!(table.contains("(not found)"));
    }
}
