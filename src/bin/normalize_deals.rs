use anyhow::Context;
use clap::Parser;
use comish_crm::core::{hubspot, salesforce};
use comish_crm::utils::logger;
use comish_crm::{normalize_batch, DealPage, Provider};
use std::io::Read;

/// Normalize a saved CRM response into the deal page the API would return
#[derive(Parser)]
#[command(name = "normalize-deals")]
struct Args {
    /// hubspot or salesforce
    #[arg(short, long)]
    provider: Provider,

    /// HubSpot search or Salesforce query response JSON; `-` reads stdin
    #[arg(default_value = "-")]
    input: String,

    #[arg(long)]
    pretty: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let raw = if args.input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("Failed to read {}", args.input))?
    };

    let payload: serde_json::Value = serde_json::from_str(&raw).context("Input is not JSON")?;
    let page = match args.provider {
        Provider::HubSpot => hubspot::parse_search_response(payload)?,
        Provider::Salesforce => salesforce::parse_query_response(payload)?,
    };

    let deals = normalize_batch(args.provider, &page.records);
    tracing::info!(
        "📊 {} of {} {} records kept",
        deals.len(),
        page.records.len(),
        args.provider.display_name()
    );

    let output = DealPage::new(deals, page.has_more);
    let json = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);
    Ok(())
}
