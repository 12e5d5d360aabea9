//! Prompt templates for the narrative agent
//!
//! Every prompt has an English and a Chinese variant rendered with MiniJinja.
//! The language comes from the request context (`"en"` or `"zh"`).

use crate::error::Result;
use minijinja::Environment;
use minijinja::value::Value;
use serde::{Deserialize, Serialize};

/// Prompt language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Chinese,
}

impl Language {
    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
        }
    }

    /// Parse a language code or name; unknown values fall back to English
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "cn" | "chinese" | "中文" => Language::Chinese,
            _ => Language::English,
        }
    }
}

/// A bilingual MiniJinja template
#[derive(Debug, Clone)]
pub struct BilingualTemplate {
    name: &'static str,
    english: &'static str,
    chinese: &'static str,
}

impl BilingualTemplate {
    pub const fn new(name: &'static str, english: &'static str, chinese: &'static str) -> Self {
        Self {
            name,
            english,
            chinese,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn raw(&self, lang: Language) -> &'static str {
        match lang {
            Language::English => self.english,
            Language::Chinese => self.chinese,
        }
    }

    /// Render with any serializable context
    pub fn render<S: Serialize>(&self, lang: Language, vars: &S) -> Result<String> {
        let env = Environment::new();
        let rendered = env.render_str(self.raw(lang), Value::from_serialize(vars))?;
        Ok(rendered.trim().to_string())
    }
}

/// System prompt shared by every narrative request
pub const ANALYST_SYSTEM: BilingualTemplate = BilingualTemplate::new(
    "finagent.system.analyst",
    "You are a financial analyst assistant for a portfolio manager. \
     Be concise and factual, keep a neutral tone, and never invent figures that are not in the data you are given.",
    "你是一名为投资组合经理服务的金融分析助理。\
     回答应简洁、客观，保持中立语气，绝不编造数据中没有的数字。",
);

/// Morning market brief from risk statistics and earnings surprises
pub const MARKET_BRIEF: BilingualTemplate = BilingualTemplate::new(
    "finagent.user.market_brief",
    r"You are a financial analyst providing a morning market brief.
Here are the market analysis results:
{{ analysis_results }}

Here are the earnings surprises:
{{ earnings_surprises }}
{% if chat_history %}
Previous conversation:
{{ chat_history }}
{% endif %}
Synthesize a concise and informative narrative market brief, no more than 200 words.
Focus on the risk exposure in Asia tech stocks and any significant earnings surprises.
Use a neutral tone, but highlight any potential concerns or positive developments.",
    r"你是一名金融分析师，正在撰写晨间市场简报。
以下是市场分析结果：
{{ analysis_results }}

以下是盈利意外数据：
{{ earnings_surprises }}
{% if chat_history %}
此前的对话：
{{ chat_history }}
{% endif %}
请综合以上信息，撰写一份简洁、信息充分的叙述性市场简报，不超过200字。
重点关注亚洲科技股的风险敞口以及任何显著的盈利意外。
语气保持中立，但要指出潜在的隐忧或积极进展。",
);

/// Question answered from retrieved filing excerpts
pub const FILINGS_ANSWER: BilingualTemplate = BilingualTemplate::new(
    "finagent.user.filings_answer",
    r"Answer the question using only the filing excerpts below.
If the excerpts do not contain the answer, say so.

Question: {{ question }}

Excerpts:
{% for doc in documents %}[{{ loop.index }}]{% if doc.source %} ({{ doc.source }}){% endif %}
{{ doc.text }}
{% else %}(no excerpts found)
{% endfor %}{% if chat_history %}
Previous conversation:
{{ chat_history }}
{% endif %}
Reply in no more than 150 words and cite excerpts by number.",
    r"请仅依据以下文件摘录回答问题。
如果摘录中没有答案，请明确说明。

问题：{{ question }}

摘录：
{% for doc in documents %}[{{ loop.index }}]{% if doc.source %} ({{ doc.source }}){% endif %}
{{ doc.text }}
{% else %}（未找到摘录）
{% endfor %}{% if chat_history %}
此前的对话：
{{ chat_history }}
{% endif %}
回答不超过150字，并按编号引用摘录。",
);

/// Every template, for listing and validation
pub fn all_templates() -> [&'static BilingualTemplate; 3] {
    [&ANALYST_SYSTEM, &MARKET_BRIEF, &FILINGS_ANSWER]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("zh"), Language::Chinese);
        assert_eq!(Language::from_code("Chinese"), Language::Chinese);
        assert_eq!(Language::from_code("fr"), Language::English);
        assert_eq!(Language::default().code(), "en");
    }

    #[test]
    fn test_all_templates_render_in_both_languages() {
        let vars = json!({
            "analysis_results": "{}",
            "earnings_surprises": "{}",
            "question": "q",
            "documents": [],
            "chat_history": "",
        });
        for template in all_templates() {
            for lang in [Language::English, Language::Chinese] {
                let rendered = template.render(lang, &vars);
                assert!(rendered.is_ok(), "{} failed in {:?}", template.name(), lang);
            }
        }
    }

    #[test]
    fn test_market_brief_includes_data_and_history() {
        let rendered = MARKET_BRIEF
            .render(
                Language::English,
                &json!({
                    "analysis_results": "{\"portfolio_risk\":0.012}",
                    "earnings_surprises": "{\"TSM\":4.2}",
                    "chat_history": "User 1: brief me",
                }),
            )
            .unwrap();

        assert!(rendered.contains("portfolio_risk"));
        assert!(rendered.contains("TSM"));
        assert!(rendered.contains("Previous conversation:\nUser 1: brief me"));
        assert!(rendered.contains("no more than 200 words"));
    }

    #[test]
    fn test_market_brief_omits_empty_history() {
        let rendered = MARKET_BRIEF
            .render(
                Language::Chinese,
                &json!({"analysis_results": "{}", "earnings_surprises": "{}", "chat_history": ""}),
            )
            .unwrap();
        assert!(!rendered.contains("此前的对话"));
        assert!(rendered.contains("亚洲科技股"));
    }

    #[test]
    fn test_filings_answer_numbers_excerpts() {
        let rendered = FILINGS_ANSWER
            .render(
                Language::English,
                &json!({
                    "question": "What are the export risks?",
                    "documents": [
                        {"source": "https://example.com/20f.htm", "text": "Export controls may limit sales."},
                        {"source": null, "text": "Capacity expansion continues."}
                    ],
                    "chat_history": "",
                }),
            )
            .unwrap();

        assert!(rendered.contains("[1] (https://example.com/20f.htm)\nExport controls may limit sales."));
        assert!(rendered.contains("[2]\nCapacity expansion continues."));

        let empty = FILINGS_ANSWER
            .render(Language::English, &json!({"question": "q", "documents": []}))
            .unwrap();
        assert!(empty.contains("(no excerpts found)"));
    }
}
