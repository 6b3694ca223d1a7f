//! Plain-text and JSON rendering of API records.

use anyhow::Result;
use serde::Serialize;

use xquare_core::models::{
    Addon, Application, GitHubInstallation, GitHubRepository, Project, ProjectOverview,
};

/// Maximum width for free-text columns before truncation
const MAX_COLUMN_WIDTH: usize = 40;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate on a char boundary, marking the cut with "..."
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

pub fn project_rows(projects: &[Project]) -> Vec<String> {
    let mut rows = vec![format!("{:<6} {:<24} {:<16} {}", "ID", "NAME", "CREATED", "DESCRIPTION")];
    rows.extend(projects.iter().map(|p| {
        format!(
            "{:<6} {:<24} {:<16} {}",
            p.id,
            truncate(&p.name, 24),
            p.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&p.description, MAX_COLUMN_WIDTH)
        )
    }));
    rows
}

pub fn application_rows(applications: &[Application]) -> Vec<String> {
    let mut rows = vec![format!(
        "{:<6} {:<24} {:<10} {:<8} {}",
        "ID", "NAME", "TIER", "PRESET", "SOURCE"
    )];
    rows.extend(applications.iter().map(|a| {
        format!(
            "{:<6} {:<24} {:<10} {:<8} {}",
            a.id,
            truncate(&a.name, 24),
            a.tier,
            a.preset().map(|p| p.as_str()).unwrap_or("-"),
            truncate(&a.source_display(), MAX_COLUMN_WIDTH)
        )
    }));
    rows
}

pub fn addon_rows(addons: &[Addon]) -> Vec<String> {
    let mut rows = vec![format!(
        "{:<6} {:<24} {:<12} {:<10} {}",
        "ID", "NAME", "TYPE", "TIER", "STORAGE"
    )];
    rows.extend(addons.iter().map(|a| {
        format!(
            "{:<6} {:<24} {:<12} {:<10} {}",
            a.id,
            truncate(&a.name, 24),
            a.addon_type,
            a.tier,
            a.storage
        )
    }));
    rows
}

pub fn installation_rows(installations: &[GitHubInstallation]) -> Vec<String> {
    let mut rows = vec![format!("{:<16} {:<24} {}", "INSTALLATION", "ACCOUNT", "TYPE")];
    rows.extend(installations.iter().map(|i| {
        format!(
            "{:<16} {:<24} {}",
            i.installation_id, i.account_login, i.account_type
        )
    }));
    rows
}

pub fn repository_rows(repositories: &[GitHubRepository]) -> Vec<String> {
    let mut rows = vec![format!("{:<40} {}", "REPOSITORY", "VISIBILITY")];
    rows.extend(repositories.iter().map(|r| {
        let visibility = if r.private { "private" } else { "public" };
        format!("{:<40} {}", truncate(&r.full_name, 40), visibility)
    }));
    rows
}

pub fn print_rows(rows: &[String]) {
    if rows.len() <= 1 {
        println!("(none)");
        return;
    }
    for row in rows {
        println!("{}", row.trim_end());
    }
}

pub fn print_overview(overview: &ProjectOverview) {
    let project = &overview.project;
    println!("{} (#{})", project.name, project.id);
    if !project.description.is_empty() {
        println!("{}", project.description);
    }
    println!();
    println!("Applications:");
    print_rows(&application_rows(&overview.applications));
    println!();
    println!("Addons:");
    print_rows(&addon_rows(&overview.addons));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long project name", 10), "a very ...");
        assert_eq!(truncate("프로젝트프로젝트", 5), "프로...");
    }

    #[test]
    fn test_rows_have_header() {
        let json = r#"[{"id":11,"name":"web","full_name":"acme/web","owner":{"login":"acme"},"private":false}]"#;
        let repos: Vec<GitHubRepository> = serde_json::from_str(json).unwrap();
        let rows = repository_rows(&repos);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("REPOSITORY"));
        assert!(rows[1].starts_with("acme/web"));
        assert!(rows[1].ends_with("public"));
    }
}
