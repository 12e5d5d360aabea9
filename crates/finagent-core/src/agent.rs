//! Core Agent trait definition

use crate::{Context, Result};
use async_trait::async_trait;

/// A component that turns a query into a text response.
///
/// The orchestrator is the main implementor: it receives a transcribed or
/// typed query, dispatches it to the market-data or filings branch, and
/// returns the narrative produced by the language model.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Process input and return output
    async fn process(&self, input: String, context: &mut Context) -> Result<String>;

    /// Get the agent's name
    fn name(&self) -> &str;

    /// One-time setup before the first query (optional)
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Agent for Echo {
        async fn process(&self, input: String, context: &mut Context) -> Result<String> {
            context.set_input_mode(crate::InputMode::Text);
            Ok(format!("You said: {input}"))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_default_initialize_and_process() {
        let mut agent = Echo;
        agent.initialize().await.unwrap();

        let mut ctx = Context::new();
        let reply = agent.process("hello".to_string(), &mut ctx).await.unwrap();
        assert_eq!(reply, "You said: hello");
        assert_eq!(ctx.input_mode(), Some(crate::InputMode::Text));
        assert_eq!(agent.name(), "echo");
    }
}
