use clap::{Parser, Subcommand};
use serde_json::Value;
use service_sdk::client::{DataOutcome, LogRequest, ServiceClient};

#[derive(Parser)]
#[command(name = "service-cli")]
#[command(about = "Exercise the instrumented service's endpoints", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Status,
    /// Print the Prometheus exposition
    Metrics,
    /// Call the simulated business operation
    Data {
        /// Number of calls to make
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
    /// Ask the service to write a log record
    Log {
        #[arg(short, long, default_value = "info")]
        level: String,

        #[arg(short, long, default_value = "test_message")]
        message: String,

        /// Extra fields as key=value (value parsed as JSON when possible)
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = ServiceClient::new(&cli.url);

    match cli.command {
        Commands::Status => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Metrics => {
            print!("{}", client.metrics().await?);
        }
        Commands::Data { count } => {
            let mut failures = 0;
            for _ in 0..count {
                match client.fetch_data().await? {
                    DataOutcome::Processed(record) => println!("{}", serde_json::to_string(&record)?),
                    DataOutcome::Failed { status, error } => {
                        failures += 1;
                        eprintln!("Error: {status} {error}");
                    }
                }
            }
            if count > 1 {
                eprintln!("{failures}/{count} calls failed");
            }
        }
        Commands::Log {
            level,
            message,
            fields,
        } => {
            let request = fields
                .into_iter()
                .fold(LogRequest::new(level, message), |request, (key, value)| {
                    request.field(key, value)
                });
            let ack = client.trigger_log(&request).await?;
            println!("{}", serde_json::to_string_pretty(&ack)?);
        }
    }

    Ok(())
}
