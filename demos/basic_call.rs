//! Basic example: connect, fetch a client and download an invoice.
//!
//! Reads its settings from `UBERSMITH_BASE_URL`, `UBERSMITH_USERNAME` and
//! `UBERSMITH_PASSWORD`, the client to look up from `UBERSMITH_CLIENT_ID` and,
//! optionally, an invoice to save as a PDF from `UBERSMITH_INVOICE_ID`.
//!
//! Run with: `cargo run --example basic_call`

use ubersmith::{Call, Cleaner, Config, Error, Params};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("ubersmith=debug,basic_call=info")
        .init();

    let config = Config::from_env()?;
    let handler = config.builder()?.connect().await?;

    println!("=== Connected ===");
    println!("Ubersmith version: {}", handler.version());
    println!("Latest version: {}", handler.latest_version());
    println!("Methods available: {}", handler.methods().len());
    println!();

    let client_id = std::env::var("UBERSMITH_CLIENT_ID").unwrap_or_else(|_| "1".to_string());

    println!("=== client.get ===");
    let client_get = Call::new("client.get")
        .require_any(["client_id", "user_login"])
        .cleaner(
            Cleaner::fields()
                .field("clientid", Cleaner::Int)
                .field("balance", Cleaner::Decimal)
                .field("created", Cleaner::Timestamp)
                .field("active", Cleaner::Bool),
        );

    let params = Params::new().with("client_id", client_id.as_str());
    let client = client_get.render(&handler, Some(&params)).await?;

    if let Some(fields) = client.to_map() {
        for (name, value) in fields {
            println!("{}: {}", name, value);
        }
    }
    println!("Attempts: {}", client.attempts());
    println!();

    println!("=== client.invoice_count ===");
    let count = Call::new("client.invoice_count")
        .require("client_id")
        .cleaner(Cleaner::Int)
        .render(&handler, Some(&params))
        .await?;
    println!("Invoices: {}", count);
    println!();

    if let Ok(invoice_id) = std::env::var("UBERSMITH_INVOICE_ID") {
        println!("=== client.invoice_get ===");
        let invoice = Call::new("client.invoice_get")
            .require("invoice_id")
            .render(
                &handler,
                Some(&Params::new().with("invoice_id", invoice_id.as_str()).with("format", "pdf")),
            )
            .await?;

        match invoice.as_file() {
            Some(file) => {
                let filename = file
                    .filename
                    .clone()
                    .unwrap_or_else(|| format!("invoice-{}.pdf", invoice_id));
                tokio::fs::write(&filename, &file.content).await?;
                println!("Saved {} bytes to {}", file.len(), filename);
            }
            None => println!("Expected a file, got: {}", invoice),
        }
        println!();
    }

    println!("=== Error handling ===");
    match handler.process_request("client.does_not_exist", None).await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::InvalidMethod { method }) => println!("Refused unknown method {}", method),
        Err(e) => println!("Other error: {}", e),
    }

    Ok(())
}
