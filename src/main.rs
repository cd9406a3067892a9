use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use order_insights::agent::{AgentOutcome, InsightsAgent};
use order_insights::config::AppConfig;
use order_insights::dashboard::OVERVIEW_SAMPLE_ROWS;
use order_insights::llm::LlmClient;
use order_insights::server::DashboardServer;
use order_insights::store::{OrderStore, QueryResult};
use order_insights::ticket::TicketClient;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "order-insights")]
#[command(about = "Ask questions about pizza orders through a language model")]
struct Args {
    /// Path to the orders database (or set ORDERS_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Model name (or set OPENAI_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the dashboard
    Serve {
        /// Address to bind (or set INSIGHTS_BIND)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Ask one question and print the outcome
    Ask { question: String },
    /// Run SQL through the guarded executor
    Query {
        sql: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show the sample rows and the total row count
    Overview,
    /// File a support ticket
    Ticket {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }

    let store = OrderStore::new(&config.db_path);

    match args.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind_addr.clone());
            if config.llm.api_key.is_none() {
                tracing::warn!("OPENAI_API_KEY is not set - submissions will fail until it is");
            }
            let client = LlmClient::new(&config.llm);
            info!("Using model {} against {}", client.model(), config.db_path.display());
            let agent = InsightsAgent::new(client, store);
            let server = DashboardServer::new(agent, config.tracker.clone());
            let listener = TcpListener::bind(bind.as_str())
                .await
                .with_context(|| format!("binding {}", bind))?;
            server.serve(listener).await?;
        }
        Command::Ask { question } => {
            let agent = InsightsAgent::new(LlmClient::new(&config.llm), store);
            info!("Question: {}", question);
            match agent.ask(&question).await? {
                AgentOutcome::EmptyQuestion => println!("Please enter a question first."),
                AgentOutcome::DirectAnswer(answer) => println!("{}", answer),
                AgentOutcome::QueryExecuted { sql, result, chart } => {
                    println!("SQL: {}\n", sql);
                    print_table(&result.head(20));
                    if let Some(chart) = chart {
                        println!("\n{}", chart.y_label);
                        for bar in chart.bars {
                            println!("  {:<24} {}", bar.label, bar.value);
                        }
                    }
                }
                AgentOutcome::QueryFailed { sql, message } => {
                    println!("SQL: {}", sql);
                    println!("Error: {}", message);
                }
                AgentOutcome::UnknownTool { name } => {
                    println!("Unknown tool requested by LLM: {}", name)
                }
            }
        }
        Command::Query { sql, format } => {
            let result = store.query(&sql)?;
            match format {
                OutputFormat::Table => print_table(&result),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Csv => result.write_csv(std::io::stdout())?,
            }
        }
        Command::Overview => {
            let overview = store.overview(OVERVIEW_SAMPLE_ROWS)?;
            println!("Total Rows: {}\n", overview.total_rows);
            print_table(&overview.sample);
        }
        Command::Ticket { title, body } => {
            let client = TicketClient::from_config(&config.tracker)?;
            let created = client.create_ticket(&title, &body).await?;
            println!("Support ticket created: {}", created.url);
        }
    }

    Ok(())
}

fn print_table(result: &QueryResult) {
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect();
    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            rendered
                .iter()
                .map(|r| r[idx].len())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(result.columns.iter().map(|c| c.as_str()).collect()));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    );
    for row in &rendered {
        println!("{}", line(row.iter().map(|c| c.as_str()).collect()));
    }
}
