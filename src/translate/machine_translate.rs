//! Machine translation API clients (DeepL, Google Translate)

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::glossary::Glossary;

pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_GLOSSARY_CAPACITY: usize = 10;
const MAX_CHUNK_CHARS: usize = 1000;
const BASE_RETRY_DELAY_MS: u64 = 500;
const MAX_RETRY_DELAY_MS: u64 = 8000;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const INTERRUPT_POLL_MS: u64 = 100;

/// The external translation service.
///
/// An empty string means the text could not be translated; implementations
/// handle their own retries before giving up.
pub trait MachineTranslator {
    fn translate(&mut self, text: &str, glossary: &[(String, String)]) -> String;

    /// Release the session.
    fn quit(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MachineTranslateProvider {
    Google,
    DeepL,
}

impl MachineTranslateProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(Self::Google),
            "deepl" => Some(Self::DeepL),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MachineTranslateConfig {
    pub provider: MachineTranslateProvider,
    pub target_lang: String,
    pub source_lang: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub max_retries: u32,
    pub glossary_capacity: usize,
    /// Raised on Ctrl-C; stops the retry loop
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl MachineTranslateConfig {
    pub fn google(target_lang: &str) -> Self {
        Self {
            provider: MachineTranslateProvider::Google,
            target_lang: Self::normalize_lang_google(target_lang),
            source_lang: "en".to_string(),
            api_key: None,
            api_base: None,
            max_retries: DEFAULT_MAX_RETRIES,
            glossary_capacity: DEFAULT_GLOSSARY_CAPACITY,
            interrupt: None,
        }
    }

    pub fn deepl(target_lang: &str, api_key: String) -> Self {
        Self {
            provider: MachineTranslateProvider::DeepL,
            target_lang: Self::normalize_lang_deepl(target_lang),
            source_lang: "EN".to_string(),
            api_key: Some(api_key),
            api_base: None,
            max_retries: DEFAULT_MAX_RETRIES,
            glossary_capacity: DEFAULT_GLOSSARY_CAPACITY,
            interrupt: None,
        }
    }

    pub fn with_api_base(mut self, base: Option<String>) -> Self {
        self.api_base = base;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_glossary_capacity(mut self, capacity: usize) -> Self {
        self.glossary_capacity = capacity;
        self
    }

    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn normalize_lang_google(lang: &str) -> String {
        match lang.to_lowercase().as_str() {
            "zh" => "zh-CN".to_string(),
            other => other.to_string(),
        }
    }

    fn normalize_lang_deepl(lang: &str) -> String {
        lang.to_uppercase()
    }

    fn deepl_base_url(&self) -> String {
        if let Some(base) = &self.api_base {
            return base.trim_end_matches('/').to_string();
        }
        match &self.api_key {
            Some(key) if key.ends_with(":fx") => "https://api-free.deepl.com/v2".to_string(),
            _ => "https://api.deepl.com/v2".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DeepLGlossary {
    glossary_id: String,
}

pub struct MachineTranslateClient {
    config: MachineTranslateConfig,
    client: reqwest::blocking::Client,
    // DeepL glossaries created during this session, by TSV content
    glossaries: HashMap<String, String>,
    placeholder_re: Regex,
    shielded_re: Regex,
}

impl MachineTranslateClient {
    pub fn new(config: MachineTranslateConfig) -> Result<Self> {
        if config.provider == MachineTranslateProvider::DeepL && config.api_key.is_none() {
            anyhow::bail!("DeepL API key is required");
        }

        Ok(Self {
            client: Self::build_http_client()?,
            config,
            glossaries: HashMap::new(),
            placeholder_re: Regex::new(r"\(%(\d+)%\)").unwrap(),
            shielded_re: Regex::new(r"⟦\s*(\d+)\s*⟧").unwrap(),
        })
    }

    fn build_http_client() -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")
    }

    pub fn provider_name(&self) -> &'static str {
        match self.config.provider {
            MachineTranslateProvider::Google => "google",
            MachineTranslateProvider::DeepL => "deepl",
        }
    }

    fn interrupted(&self) -> bool {
        self.config
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Sleep before the next try, waking early on interrupt.
    fn wait_for_retry(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.interrupted() {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(INTERRUPT_POLL_MS)));
        }
    }

    fn reset_session(&mut self) {
        match Self::build_http_client() {
            Ok(client) => self.client = client,
            Err(e) => tracing::warn!("Failed to reset {} session: {}", self.provider_name(), e),
        }
    }

    fn try_translate(&mut self, text: &str, glossary: &[(String, String)]) -> Result<String> {
        if text.chars().count() > MAX_CHUNK_CHARS {
            let mut parts = Vec::new();
            for chunk in split_text(text, MAX_CHUNK_CHARS) {
                parts.push(self.try_translate_chunk(&chunk, glossary)?);
            }
            return Ok(parts.join(" "));
        }
        self.try_translate_chunk(text, glossary)
    }

    fn try_translate_chunk(&mut self, text: &str, glossary: &[(String, String)]) -> Result<String> {
        match self.config.provider {
            MachineTranslateProvider::DeepL => self.translate_deepl(text, glossary),
            MachineTranslateProvider::Google => self.translate_google(text, glossary),
        }
    }

    fn translate_deepl(&mut self, text: &str, glossary: &[(String, String)]) -> Result<String> {
        let glossary_id = self.ensure_deepl_glossary(glossary)?;
        let url = format!("{}/translate", self.config.deepl_base_url());

        let mut form_params: Vec<(&str, &str)> = vec![
            ("text", text),
            ("target_lang", self.config.target_lang.as_str()),
            ("source_lang", self.config.source_lang.as_str()),
        ];
        if let Some(id) = glossary_id.as_deref() {
            form_params.push(("glossary_id", id));
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.deepl_auth())
            .form(&form_params)
            .send()
            .context("Failed to send request to DeepL")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("DeepL request failed ({}): {}", status, body);
        }

        let result: DeepLResponse = response.json().context("Failed to parse DeepL response")?;
        result
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .context("No translation result from DeepL")
    }

    /// Register the per-call glossary with DeepL, reusing an identical one
    /// created earlier in the session.
    fn ensure_deepl_glossary(&mut self, glossary: &[(String, String)]) -> Result<Option<String>> {
        let entries: Vec<String> = glossary
            .iter()
            .filter(|(s, t)| !s.contains(['\t', '\n']) && !t.contains(['\t', '\n']))
            .take(self.config.glossary_capacity)
            .map(|(s, t)| format!("{}\t{}", s, t))
            .collect();
        if entries.is_empty() {
            return Ok(None);
        }
        if glossary.len() > entries.len() {
            tracing::debug!(
                "Glossary capped at {} of {} terms",
                entries.len(),
                glossary.len()
            );
        }

        let tsv = entries.join("\n");
        if let Some(id) = self.glossaries.get(&tsv) {
            return Ok(Some(id.clone()));
        }

        let url = format!("{}/glossaries", self.config.deepl_base_url());
        let name = format!("rulebook-tl-{}", self.glossaries.len());
        let form_params = [
            ("name", name.as_str()),
            ("source_lang", self.config.source_lang.as_str()),
            ("target_lang", self.config.target_lang.as_str()),
            ("entries", tsv.as_str()),
            ("entries_format", "tsv"),
        ];

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.deepl_auth())
            .form(&form_params)
            .send()
            .context("Failed to create DeepL glossary")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("DeepL glossary creation failed ({}): {}", status, body);
        }

        let created: DeepLGlossary = response
            .json()
            .context("Failed to parse DeepL glossary response")?;
        self.glossaries.insert(tsv, created.glossary_id.clone());
        Ok(Some(created.glossary_id))
    }

    fn deepl_auth(&self) -> String {
        format!(
            "DeepL-Auth-Key {}",
            self.config.api_key.as_deref().unwrap_or_default()
        )
    }

    /// Google has no glossary support: terms are substituted up front and
    /// placeholders are shielded from the translator.
    fn translate_google(&self, text: &str, glossary: &[(String, String)]) -> Result<String> {
        let capacity = self.config.glossary_capacity;
        let terms = Glossary::from_terms(glossary.iter().take(capacity).cloned());
        let prepared = terms.substitute(text);
        let protected = self.placeholder_re.replace_all(&prepared, "⟦$1⟧");

        let url = format!(
            "https://translate.googleapis.com/translate_a/single?client=gtx&sl={}&tl={}&dt=t&q={}",
            self.config.source_lang,
            self.config.target_lang,
            urlencoding::encode(&protected)
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .context("Failed to send request to Google Translate")?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("Google Translate request failed: {}", status);
        }

        let body = response.text().context("Failed to read response")?;
        let parsed: serde_json::Value =
            serde_json::from_str(&body).context("Failed to parse Google Translate response")?;

        let mut result = String::new();
        if let Some(outer) = parsed.get(0).and_then(|v| v.as_array()) {
            for item in outer {
                if let Some(translated) = item.get(0).and_then(|v| v.as_str()) {
                    result.push_str(translated);
                }
            }
        }

        if result.is_empty() {
            anyhow::bail!("No translation result from Google");
        }

        Ok(self.restore_placeholders(&result))
    }

    /// Undo the placeholder shielding, tolerating the spaces Google likes to
    /// insert inside the brackets.
    fn restore_placeholders(&self, text: &str) -> String {
        self.shielded_re.replace_all(text, "(%$1%)").into_owned()
    }

    fn delete_deepl_glossaries(&mut self) {
        let base = self.config.deepl_base_url();
        let ids: Vec<String> = self.glossaries.drain().map(|(_, id)| id).collect();
        for id in ids {
            let result = self
                .client
                .delete(format!("{}/glossaries/{}", base, id))
                .header("Authorization", self.deepl_auth())
                .send();
            if let Err(e) = result {
                tracing::warn!("Failed to delete DeepL glossary {}: {}", id, e);
            }
        }
    }
}

impl MachineTranslator for MachineTranslateClient {
    fn translate(&mut self, text: &str, glossary: &[(String, String)]) -> String {
        let max_retries = self.config.max_retries;

        for attempt in 1..=max_retries {
            if self.interrupted() {
                tracing::warn!("{} translator: interrupted", self.provider_name());
                return String::new();
            }

            match self.try_translate(text, glossary) {
                Ok(translated) => return translated,
                Err(e) => {
                    tracing::warn!(
                        "{} translator failed, try {}/{}: {:#}",
                        self.provider_name(),
                        attempt,
                        max_retries,
                        e
                    );
                    if attempt < max_retries {
                        self.wait_for_retry(retry_delay(attempt));
                        self.reset_session();
                    }
                }
            }
        }

        tracing::warn!(
            "{} translator: too many retries, giving up",
            self.provider_name()
        );
        String::new()
    }

    fn quit(&mut self) {
        if self.config.provider == MachineTranslateProvider::DeepL {
            self.delete_deepl_glossaries();
        }
    }
}

/// Exponential backoff, capped at `MAX_RETRY_DELAY_MS`.
fn retry_delay(attempt: u32) -> Duration {
    let delay = BASE_RETRY_DELAY_MS << (attempt.max(1) - 1).min(10);
    Duration::from_millis(delay.min(MAX_RETRY_DELAY_MS))
}

/// Split on sentence ends into chunks of at most `max_chars` characters. A
/// single sentence longer than the limit becomes its own chunk.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in text.split_inclusive('.') {
        if !current.is_empty()
            && current.chars().count() + sentence.chars().count() > max_chars
        {
            chunks.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(sentence);
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_text() {
        let chunks = split_text("One. Two. Three.", 10);
        assert_eq!(chunks, vec!["One. Two.", "Three."]);
    }

    #[test]
    fn test_split_text_short() {
        assert_eq!(split_text("Hello world", 1000), vec!["Hello world"]);
    }

    #[test]
    fn test_retry_delay() {
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(3), Duration::from_millis(2000));
        assert_eq!(retry_delay(10), Duration::from_millis(8000));
    }

    #[test]
    fn test_restore_placeholders() {
        let config = MachineTranslateConfig::google("fr");
        let client = MachineTranslateClient::new(config).unwrap();
        assert_eq!(
            client.restore_placeholders("Le ⟦0⟧ inflige ⟦ 1 ⟧"),
            "Le (%0%) inflige (%1%)"
        );
    }

    // Nothing listens on the discard port, so every try fails at once
    fn unreachable_deepl(flag: &Arc<AtomicBool>) -> MachineTranslateClient {
        let config = MachineTranslateConfig::deepl("fr", "abc".to_string())
            .with_api_base(Some("http://127.0.0.1:9/v2".to_string()))
            .with_interrupt(Arc::clone(flag));
        MachineTranslateClient::new(config).unwrap()
    }

    #[test]
    fn test_interrupted_client_does_not_translate() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut client = unreachable_deepl(&flag);

        let started = Instant::now();
        assert_eq!(client.translate("Some text", &[]), "");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_interrupt_cuts_retry_wait() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut client = unreachable_deepl(&flag);

        let raiser = {
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                flag.store(true, Ordering::SeqCst);
            })
        };

        // Ten tries with backoff would wait for more than 40s
        let started = Instant::now();
        assert_eq!(client.translate("Some text", &[]), "");
        assert!(started.elapsed() < Duration::from_secs(10));
        raiser.join().unwrap();
    }

    #[test]
    fn test_deepl_requires_key() {
        let mut config = MachineTranslateConfig::deepl("fr", "k".to_string());
        config.api_key = None;
        assert!(MachineTranslateClient::new(config).is_err());
    }

    #[test]
    fn test_deepl_base_url() {
        let free = MachineTranslateConfig::deepl("fr", "abc:fx".to_string());
        assert_eq!(free.deepl_base_url(), "https://api-free.deepl.com/v2");
        assert_eq!(free.target_lang, "FR");

        let custom = MachineTranslateConfig::deepl("fr", "abc".to_string())
            .with_api_base(Some("http://localhost:9000/v2/".to_string()));
        assert_eq!(custom.deepl_base_url(), "http://localhost:9000/v2");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!(
            MachineTranslateProvider::from_str("DeepL"),
            Some(MachineTranslateProvider::DeepL)
        );
        assert_eq!(MachineTranslateProvider::from_str("openai"), None);
    }
}
