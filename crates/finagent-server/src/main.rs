//! finagent HTTP server
//!
//! ```bash
//! export ALPHA_VANTAGE_API_KEY=...
//! export OPENAI_API_KEY=...
//! cargo run --bin finagent-server
//! ```

use finagent_server::{BIND_ENV, DEFAULT_BIND};
use finagent_utils::{LogFormat, init_tracing, optional_env};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(
        LogFormat::from_env(),
        "info,finagent_server=debug,finagent_market=debug",
    );

    let bind = optional_env(BIND_ENV).unwrap_or_else(|| DEFAULT_BIND.to_string());
    finagent_server::run(&bind).await
}
