//! Narrative generation
//!
//! [`LanguageAgent`] turns analysis output and retrieved filing excerpts into
//! short prose through an [`LLMProvider`]. Failures never reach the caller:
//! they are logged and replaced by a fixed apology so the voice path always
//! has something to say.

use crate::analysis::RiskAssessment;
use crate::conversation::{ConversationHistory, PROMPT_HISTORY_TURNS};
use crate::error::{MarketError, Result};
use crate::model::EarningsSurprise;
use crate::prompts::{ANALYST_SYSTEM, FILINGS_ANSWER, Language, MARKET_BRIEF};
use crate::retrieval::RetrievedDocument;
use finagent_llm::{CompletionRequest, LLMError, LLMProvider, Message};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Returned when the market brief cannot be generated
pub const BRIEF_FALLBACK: &str = "I am unable to generate a market brief at this time.";

/// Returned when a filings question cannot be answered
pub const ANSWER_FALLBACK: &str = "I am unable to answer from the filings at this time.";

const DEFAULT_MAX_TOKENS: usize = 512;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Excerpt passed to the filings prompt
#[derive(Serialize)]
struct PromptExcerpt<'a> {
    source: Option<&'a str>,
    text: &'a str,
}

/// LLM-backed narrative writer with conversation memory
pub struct LanguageAgent {
    llm: Arc<dyn LLMProvider>,
    model: String,
    language: Language,
    max_tokens: usize,
    temperature: f32,
    history: Mutex<ConversationHistory>,
}

impl LanguageAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            language: Language::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            history: Mutex::new(ConversationHistory::new()),
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Market brief from a risk assessment and recent earnings surprises
    pub async fn generate_market_brief(
        &self,
        analysis: &RiskAssessment,
        earnings_surprises: &[EarningsSurprise],
    ) -> String {
        self.generate_market_brief_in(analysis, earnings_surprises, self.language)
            .await
    }

    /// [`LanguageAgent::generate_market_brief`] in an explicit language
    pub async fn generate_market_brief_in(
        &self,
        analysis: &RiskAssessment,
        earnings_surprises: &[EarningsSurprise],
        language: Language,
    ) -> String {
        match self.market_brief(analysis, earnings_surprises, language).await {
            Ok(brief) => brief,
            Err(e) => {
                error!("Error generating market brief: {e}");
                BRIEF_FALLBACK.to_string()
            }
        }
    }

    /// Answer `question` from retrieved filing excerpts
    pub async fn answer_from_documents(
        &self,
        question: &str,
        documents: &[RetrievedDocument],
        language: Language,
    ) -> String {
        match self.filings_answer(question, documents, language).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error answering from filings: {e}");
                ANSWER_FALLBACK.to_string()
            }
        }
    }

    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }

    /// Symbols discussed most recently, if any
    pub async fn recent_symbols(&self) -> Option<Vec<String>> {
        self.history.lock().await.current_symbols().map(<[String]>::to_vec)
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    async fn market_brief(
        &self,
        analysis: &RiskAssessment,
        earnings_surprises: &[EarningsSurprise],
        language: Language,
    ) -> Result<String> {
        let chat_history = self.recent_context().await;
        let prompt = MARKET_BRIEF.render(
            language,
            &json!({
                "analysis_results": serde_json::to_string_pretty(analysis)?,
                "earnings_surprises": serde_json::to_string_pretty(earnings_surprises)?,
                "chat_history": chat_history,
            }),
        )?;

        let brief = self.complete(language, prompt).await?;

        let symbols = analysis
            .report()
            .map(|report| report.symbols.clone())
            .unwrap_or_default();
        let request = if symbols.is_empty() {
            "Market brief".to_string()
        } else {
            format!("Market brief for {}", symbols.join(", "))
        };
        self.history
            .lock()
            .await
            .add_turn(request, brief.clone(), symbols);

        info!(chars = brief.len(), "Generated market brief");
        Ok(brief)
    }

    async fn filings_answer(
        &self,
        question: &str,
        documents: &[RetrievedDocument],
        language: Language,
    ) -> Result<String> {
        let excerpts: Vec<PromptExcerpt<'_>> = documents
            .iter()
            .map(|doc| PromptExcerpt {
                source: doc.metadata.get("source").and_then(|v| v.as_str()),
                text: &doc.text,
            })
            .collect();

        let chat_history = self.recent_context().await;
        let prompt = FILINGS_ANSWER.render(
            language,
            &json!({
                "question": question,
                "documents": excerpts,
                "chat_history": chat_history,
            }),
        )?;

        let answer = self.complete(language, prompt).await?;
        self.history
            .lock()
            .await
            .add_turn(question.to_string(), answer.clone(), Vec::new());
        Ok(answer)
    }

    async fn recent_context(&self) -> String {
        self.history
            .lock()
            .await
            .format_recent_context(PROMPT_HISTORY_TURNS)
    }

    async fn complete(&self, language: Language, prompt: String) -> Result<String> {
        let request = CompletionRequest::builder(&self.model)
            .system(ANALYST_SYSTEM.render(language, &())?)
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        debug!(provider = self.llm.name(), model = %self.model, "Requesting narrative");
        let response = self.llm.complete(request).await?;

        let text = response.message.text().trim().to_string();
        if text.is_empty() {
            return Err(MarketError::Llm(LLMError::UnexpectedResponse(
                "Model returned an empty response".to_string(),
            )));
        }
        Ok(text)
    }
}
