//! Background session titles.
//!
//! A chat turn on a session that still carries a placeholder title spawns a
//! task that names the session after its first question. The task never
//! touches the turn: failures are logged and the placeholder stays.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use pa_domain::config::LlmConfig;
use pa_domain::error::{Error, Result};
use pa_domain::trace::TraceEvent;
use pa_sessions::SessionStore;

const TITLE_PROMPT: &str = "Summarize the user's question as a short session title. \
Reply with the title only, no quotes or punctuation, in the language of the question.";

#[async_trait]
pub trait TitleGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, query: &str) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OpenAI-compatible generator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LlmTitleGenerator {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl LlmTitleGenerator {
    /// `None` when the configured API key env var is unset or empty.
    pub fn from_config(cfg: &LlmConfig) -> Result<Option<Self>> {
        let Some(api_key) = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
        else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Some(Self {
            http,
            url: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            model: cfg.model.clone(),
            api_key,
        }))
    }
}

#[async_trait]
impl TitleGenerator for LlmTitleGenerator {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn generate(&self, query: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "max_tokens": 32,
            "messages": [
                { "role": "system", "content": TITLE_PROMPT },
                { "role": "user", "content": query },
            ],
        });

        let started = Instant::now();
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| llm_error(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| llm_error(e.to_string()))?;

        TraceEvent::LlmRequest {
            provider: "openai_compat".into(),
            model: self.model.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        if !status.is_success() {
            return Err(llm_error(format!("HTTP {} - {}", status.as_u16(), text)));
        }
        let value: Value = serde_json::from_str(&text)?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| llm_error("response has no message content".into()))
    }
}

fn llm_error(message: String) -> Error {
    Error::Llm {
        provider: "openai_compat".into(),
        message,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Title service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TitleService {
    generator: Option<Arc<dyn TitleGenerator>>,
    max_chars: usize,
    permits: Arc<Semaphore>,
}

impl TitleService {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let generator = LlmTitleGenerator::from_config(cfg)?
            .map(|g| Arc::new(g) as Arc<dyn TitleGenerator>);
        if generator.is_none() {
            tracing::info!(
                env = %cfg.api_key_env,
                "no title LLM key set; titles fall back to truncation"
            );
        }
        Ok(Self::new(generator, cfg.max_title_chars, cfg.max_concurrent_titles))
    }

    pub fn new(
        generator: Option<Arc<dyn TitleGenerator>>,
        max_chars: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            generator,
            max_chars: max_chars.max(1),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Title for `query` and the name of whatever produced it.
    pub async fn title_for(&self, query: &str) -> (String, &'static str) {
        if let Some(generator) = &self.generator {
            match generator.generate(query).await {
                Ok(raw) => {
                    let title = clean_title(&raw, self.max_chars);
                    if !title.is_empty() {
                        return (title, generator.name());
                    }
                    tracing::warn!(raw = %raw, "title generator returned an empty title");
                }
                Err(e) => tracing::warn!(error = %e, "title generation failed, truncating"),
            }
        }
        (clean_title(query, self.max_chars), "truncate")
    }

    /// Fire-and-forget: name `session_id` after `query` unless it has been
    /// renamed in the meantime.
    pub fn schedule(
        self: &Arc<Self>,
        sessions: Arc<SessionStore>,
        session_id: String,
        query: String,
    ) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let Ok(_permit) = service.permits.clone().acquire_owned().await else {
                return;
            };
            let started = Instant::now();
            let (title, generator) = service.title_for(&query).await;
            if title.is_empty() {
                return;
            }
            match sessions.set_generated_title(&session_id, &title) {
                Ok(true) => TraceEvent::TitleGenerated {
                    session_id,
                    generator: generator.into(),
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit(),
                Ok(false) => {
                    tracing::debug!(session_id = %session_id, "session renamed or gone, title dropped")
                }
                Err(e) => tracing::warn!(session_id = %session_id, error = %e, "storing title failed"),
            }
        })
    }
}

/// First line, stripped of surrounding quotes and punctuation, at most
/// `max_chars` characters.
pub fn clean_title(raw: &str, max_chars: usize) -> String {
    const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '《', '》', '「', '」', '`'];
    const TRAILING: &[char] = &['.', '。', '?', '？', '!', '！', ',', '，', ':', '：', ';', '；'];

    let line = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let line = line.trim_matches(|c: char| {
        QUOTES.contains(&c) || TRAILING.contains(&c) || c.is_whitespace()
    });
    line.chars().take(max_chars).collect::<String>().trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl TitleGenerator for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn generate(&self, _query: &str) -> Result<String> {
            Ok(self.0.to_owned())
        }
    }

    struct Broken;

    #[async_trait]
    impl TitleGenerator for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn generate(&self, _query: &str) -> Result<String> {
            Err(llm_error("offline".into()))
        }
    }

    #[test]
    fn clean_title_strips_and_caps() {
        assert_eq!(clean_title("「iware组件版本」。", 10), "iware组件版本");
        assert_eq!(clean_title("\n  \"Branch lookup\"\nextra", 10), "Branch loo");
        assert_eq!(clean_title("   ", 10), "");
    }

    #[tokio::test]
    async fn generator_title_is_cleaned() {
        let svc = TitleService::new(Some(Arc::new(Fixed("\"24a 镜像信息查询结果\""))), 6, 1);
        assert_eq!(svc.title_for("whatever").await, ("24a 镜像".to_string(), "fixed"));
    }

    #[tokio::test]
    async fn failures_fall_back_to_truncation() {
        let svc = TitleService::new(Some(Arc::new(Broken)), 10, 1);
        let (title, generator) = svc.title_for("branch foo/bar component iware").await;
        assert_eq!(title, "branch foo");
        assert_eq!(generator, "truncate");
    }

    #[tokio::test]
    async fn scheduled_title_respects_renames() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SessionStore::new(dir.path()).unwrap());
        let svc = Arc::new(TitleService::new(Some(Arc::new(Fixed("iware查询"))), 10, 1));

        let fresh = sessions.create("u1", "New Chat").unwrap();
        svc.schedule(sessions.clone(), fresh.session_id.clone(), "q".into())
            .await
            .unwrap();
        assert_eq!(sessions.get(&fresh.session_id).unwrap().title, "iware查询");

        let renamed = sessions.create("u1", "New Chat").unwrap();
        sessions.rename(&renamed.session_id, "mine").unwrap();
        svc.schedule(sessions.clone(), renamed.session_id.clone(), "q".into())
            .await
            .unwrap();
        assert_eq!(sessions.get(&renamed.session_id).unwrap().title, "mine");
    }
}
