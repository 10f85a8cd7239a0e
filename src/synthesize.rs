//! Grounded answer synthesis over retrieved results.

use std::fmt::Write;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::SynthesisError;
use crate::llm::Generator;
use crate::models::RetrievalResult;

/// Returned, without a model call, when retrieval found nothing.
pub const NO_RESULTS_MESSAGE: &str = "검색 결과가 없습니다.";

/// Returned in place of an answer when generation fails.
pub const GENERATION_FAILED_MESSAGE: &str = "답변 생성 중 오류가 발생했습니다.";

const RULE_WIDTH: usize = 50;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s)\]>"'<]+"#).expect("URL pattern is valid")
});

pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    answer_language: String,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, answer_language: impl Into<String>) -> Self {
        Self {
            generator,
            answer_language: answer_language.into(),
        }
    }

    /// Answer `query` from `results`. Empty results short-circuit to
    /// [`NO_RESULTS_MESSAGE`].
    pub async fn synthesize(
        &self,
        query: &str,
        results: &[RetrievalResult],
    ) -> Result<String, SynthesisError> {
        if results.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }

        let prompt = build_prompt(query, &format_results(results), &self.answer_language);
        let answer = self.generator.generate(&prompt).await?;
        Ok(answer.trim().to_string())
    }
}

/// Numbered evidence blocks, each followed by a rule line.
pub fn format_results(results: &[RetrievalResult]) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::from("\nStack Overflow search results:");
    for (i, r) in results.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. Question: {}\nAnswer: {}\nReference: {}\n{rule}\n",
            i + 1,
            r.title,
            r.answer_text,
            r.link
        );
    }
    out
}

pub fn build_prompt(query: &str, formatted_results: &str, answer_language: &str) -> String {
    format!(
        "You are a programming expert.\n\
         Answer the user's question in {answer_language}, using the Stack Overflow search results below.\n\
         \n\
         Search results:\n\
         {formatted_results}\n\
         \n\
         User question: {query}\n\
         \n\
         Answer format:\n\
         1. A short, direct answer\n\
         2. A code example, if one helps\n\
         3. Details and caveats\n\
         4. The Stack Overflow links you relied on (use ONLY links that appear in the search results above)\n\
         \n\
         Answer:"
    )
}

/// Links in `answer` that were not among the supplied results.
pub fn uncited_links(answer: &str, results: &[RetrievalResult]) -> Vec<String> {
    let known: Vec<&str> = results
        .iter()
        .map(|r| r.link.trim_end_matches('/'))
        .collect();

    let mut unknown: Vec<String> = Vec::new();
    for link in extract_links(answer) {
        let normalized = link.trim_end_matches('/');
        if !known.contains(&normalized) && !unknown.iter().any(|u| u == link) {
            unknown.push(link.to_string());
        }
    }
    unknown
}

fn extract_links(text: &str) -> Vec<&str> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(is_sentence_punctuation))
        .filter(|link| !link.is_empty())
        .collect()
}

fn is_sentence_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?')
}
