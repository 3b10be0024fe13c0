//! The `accounts` command: list the sub-accounts the caller may inspect

use crate::config::Credentials;
use crate::output::{print_warning, OutputFormat};
use anyhow::Result;
use coverage_lib::{HttpTelemetryApi, TelemetryApi};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Sub-Account")]
    name: String,
}

pub async fn run(credentials: Credentials, format: OutputFormat) -> Result<()> {
    let api = HttpTelemetryApi::new(
        &credentials.account,
        &credentials.api_key,
        &credentials.api_secret,
    )?;
    let accounts = api.identity_profile().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&accounts)?),
        OutputFormat::Csv => {
            println!("Subaccount");
            for account in &accounts {
                println!("{}", account);
            }
        }
        OutputFormat::Table => {
            if accounts.is_empty() {
                print_warning("No accessible sub-accounts");
                return Ok(());
            }
            let rows: Vec<AccountRow> = accounts.into_iter().map(|name| AccountRow { name }).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
