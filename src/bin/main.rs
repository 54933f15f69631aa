//! Command-line chat: `finance-chat [query...]`
//!
//! Each argument is one turn on a single thread. With no arguments, lines
//! are read from stdin until `exit`.

use finance_chat_orchestrator::{build_chat_service, config::AppConfig, ChatService};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

async fn ask(service: &ChatService, thread_id: Uuid, query: &str) {
    match service.handle_turn(thread_id, query).await {
        Ok(response) => {
            println!("\nAssistant: {}\n", response.answer);
        }
        Err(e) => eprintln!("Error: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = AppConfig::from_env()?;
    let service = build_chat_service(&config)?;
    let thread_id = Uuid::new_v4();

    let queries: Vec<String> = std::env::args().skip(1).collect();
    if !queries.is_empty() {
        for query in &queries {
            println!("User: {}", query);
            ask(&service, thread_id, query).await;
        }
        return Ok(());
    }

    println!("Finance Bank Agent. Type 'exit' to quit.");

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        ask(&service, thread_id, query).await;
    }

    Ok(())
}
