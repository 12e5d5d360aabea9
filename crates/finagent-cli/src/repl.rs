//! Interactive session

use finagent_core::context::keys;
use finagent_core::{Agent, Context};
use finagent_market::Orchestrator;
use finagent_market::config::parse_symbol_list;
use std::io::{self, BufRead, Write};
use uuid::Uuid;

const HELP: &str = "\
Ask about \"market data\" for a risk brief, or about \"filings\" for answers
from ingested documents.

  /lang <en|zh>  switch the narrative language
  /symbols [T,..] analyze these tickers; no argument restores the watchlist
  /clear         forget the conversation
  /help          show this help
  /exit          quit";

pub async fn run(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    println!("finagent ready. Type /help for commands.\n");

    let mut context = Context::new()
        .with_session_id(Uuid::new_v4().to_string())
        .with_language(orchestrator.language_agent().language().code());
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("finagent> ");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                continue;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/exit" | "/quit", _) => {
                println!("Goodbye!");
                break;
            }
            ("/help", _) => println!("{HELP}\n"),
            ("/clear", _) => {
                orchestrator.language_agent().clear_history().await;
                println!("Conversation history cleared.\n");
            }
            ("/lang", code) if !code.is_empty() => {
                context = context.with_language(code);
                println!("Language set to {code}.\n");
            }
            ("/symbols", "") => {
                context.remove(keys::SYMBOLS);
                println!("Using the watchlist.\n");
            }
            ("/symbols", list) => {
                let symbols = parse_symbol_list(list);
                println!("Analyzing {}.\n", symbols.join(", "));
                context = context.with_symbols(symbols);
            }
            _ => match orchestrator.process(input.to_string(), &mut context).await {
                Ok(response) => println!("{response}\n"),
                Err(e) => eprintln!("Error: {e}\n"),
            },
        }
    }

    Ok(())
}
