//! Output rendering for coverage reports

use clap::ValueEnum;
use colored::Colorize;
use coverage_lib::{CanonicalRecord, CorrelationResult};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Sectioned tables (default)
    #[default]
    Table,
    /// CSV for spreadsheet processing
    Csv,
    /// JSON for machine processing
    Json,
}

/// Row for the per-section record tables
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "K8s Node")]
    k8s_node: String,
    #[tabled(rename = "OS Image")]
    os_image: String,
    #[tabled(rename = "Sub-Account")]
    sub_account: String,
}

impl RecordRow {
    fn from(record: &CanonicalRecord) -> Self {
        Self {
            identifier: record.identity.clone(),
            created: format_timestamp(&record.creation_time),
            k8s_node: if record.is_container_orchestrated {
                "✓".to_string()
            } else {
                String::new()
            },
            os_image: record.os_image.clone(),
            sub_account: record.account_label.clone(),
        }
    }
}

/// Shorten an RFC 3339 timestamp for table display; anything unparseable is
/// shown as-is.
fn format_timestamp(raw: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Render the sorted result in the requested format.
pub fn render(result: &CorrelationResult, format: OutputFormat) {
    match format {
        OutputFormat::Table => render_table(result),
        OutputFormat::Csv => render_csv(result),
        OutputFormat::Json => render_json(result),
    }
}

fn render_table(result: &CorrelationResult) {
    print_section("Instances without agent", &result.inventory_only);
    print_section("Instances reconciled with agent", &result.matched);
    print_section("Agents without corresponding inventory", &result.agent_only);
}

fn print_section(title: &str, records: &[CanonicalRecord]) {
    if records.is_empty() {
        return;
    }
    println!("{}", title.bold());
    let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}\n", table);
}

fn render_csv(result: &CorrelationResult) {
    println!(
        "Identifier,CreationTime,Instance_without_agent,Instance_reconciled_with_agent,\
         Agent_without_inventory,Os_image,Tags,Subaccount"
    );
    for record in &result.inventory_only {
        println!("{}", csv_row(record, "true", "", ""));
    }
    for record in &result.matched {
        println!("{}", csv_row(record, "", "true", ""));
    }
    for record in &result.agent_only {
        println!("{}", csv_row(record, "", "", "true"));
    }
}

fn csv_row(record: &CanonicalRecord, without: &str, matched: &str, agent_only: &str) -> String {
    format!(
        "{},{},{},{},{},\"{}\",\"{}\",{}",
        record.identity,
        record.creation_time,
        without,
        matched,
        agent_only,
        record.os_image,
        tags_field(record),
        record.account_label
    )
}

/// Tag bag rendered for a quoted CSV field; double quotes are swapped for
/// single quotes rather than escaped.
fn tags_field(record: &CanonicalRecord) -> String {
    if record.tags.is_null() {
        return String::new();
    }
    record.tags.to_string().replace('"', "'")
}

fn render_json(result: &CorrelationResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to serialize result: {}", e)),
    }
}

struct AccountStats {
    account: String,
    distinct_hosts: usize,
    with_agent: usize,
    coverage: f64,
}

/// Per-account breakdown over the full discovered account list, not just
/// the accounts that produced records: an account with no inventoried
/// hosts yields a 0/0/0.0% block rather than disappearing.
fn account_statistics(result: &CorrelationResult, accounts: &[String]) -> Vec<AccountStats> {
    accounts
        .iter()
        .map(|account| {
            let without = result
                .inventory_only
                .iter()
                .filter(|r| &r.account_label == account)
                .count();
            let with = result
                .matched
                .iter()
                .filter(|r| &r.account_label == account)
                .count();
            let coverage = if with > 0 {
                (with as f64 / (without + with) as f64 * 1000.0).round() / 10.0
            } else {
                0.0
            };
            AccountStats {
                account: account.clone(),
                distinct_hosts: without + with,
                with_agent: with,
                coverage,
            }
        })
        .collect()
}

/// Print overall coverage statistics, followed by one block per entry in
/// `accounts`. An empty slice skips the per-account section.
pub fn print_statistics(result: &CorrelationResult, accounts: &[String]) {
    println!(
        "Number of distinct hosts identified during inventory assessment: {}",
        result.distinct_hosts()
    );
    println!(
        "Number of hosts which report successful agent operation: {}",
        result.matched.len()
    );
    println!("Coverage Percentage: {:.1}%", result.coverage_percent());

    for stats in account_statistics(result, accounts) {
        println!();
        println!(
            "{} -- Number of distinct hosts identified during inventory assessment: {}",
            stats.account, stats.distinct_hosts
        );
        println!(
            "{} -- Number of hosts which report successful agent operation: {}",
            stats.account, stats.with_agent
        );
        println!("{} -- Coverage Percentage: {:.1}%", stats.account, stats.coverage);
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_csv_row_marks_single_category() {
        let mut record = CanonicalRecord::agent_only("i-1", "sub-a");
        record.tags = json!([{"Key": "Name", "Value": "web"}]);

        let row = csv_row(&record, "true", "", "");
        assert!(row.starts_with("i-1,,true,,,"));
        assert!(row.contains("'Key'"));
        assert!(!row.contains("\"Key\""));
        assert!(row.ends_with(",sub-a"));
    }

    #[test]
    fn test_account_statistics_includes_zero_host_accounts() {
        let result = CorrelationResult {
            inventory_only: vec![CanonicalRecord::agent_only("i-1", "sub-a")],
            matched: vec![CanonicalRecord::agent_only("i-2", "sub-a")],
            agent_only: vec![CanonicalRecord::agent_only("stray", "sub-c")],
        };
        let accounts: Vec<String> = ["sub-a", "sub-b", "sub-c"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let stats = account_statistics(&result, &accounts);
        assert_eq!(stats.len(), 3);

        assert_eq!(stats[0].distinct_hosts, 2);
        assert_eq!(stats[0].with_agent, 1);
        assert_eq!(stats[0].coverage, 50.0);

        // No discovered hosts still produces a zero block.
        assert_eq!(stats[1].distinct_hosts, 0);
        assert_eq!(stats[1].coverage, 0.0);

        // agent_only records do not count as inventoried hosts.
        assert_eq!(stats[2].distinct_hosts, 0);
        assert_eq!(stats[2].coverage, 0.0);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp("2024-05-01T12:30:45Z"),
            "2024-05-01 12:30"
        );
        assert_eq!(format_timestamp("not-a-time"), "not-a-time");
    }

    #[test]
    fn test_tags_field_empty_for_null() {
        let record = CanonicalRecord::agent_only("i-1", "sub-a");
        assert_eq!(tags_field(&record), "");
    }
}
