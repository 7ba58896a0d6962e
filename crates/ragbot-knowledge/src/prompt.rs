//! Prompt assembly — greedy packing of ranked passages under a token budget.
//!
//! Layout of the final user message:
//! ```text
//! <preamble>
//!
//! Wikipedia article section:
//! """
//! <passage 1>
//! """
//! ...
//!
//! Question: <query>
//! ```
//!
//! Every trial prompt includes the question suffix, so whenever at least one
//! passage is attached the returned text is exactly the last trial that fit
//! and its token count is within the budget. With zero passages the preamble
//! and question are returned as-is, even if they alone exceed the budget.

use crate::tokens::TokenCounter;

/// Fixed framing around the passages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub preamble: String,
    pub section_label: String,
}

impl PromptTemplate {
    /// Standard framing for passages about `topic`.
    pub fn for_topic(topic: &str) -> Self {
        Self {
            preamble: format!(
                "Use the following articles about {topic} to answer the following question. \
                 If the answer cannot be found in the articles, write \"I could not find an answer.\""
            ),
            section_label: "Wikipedia article section".into(),
        }
    }

    pub fn with_section_label(mut self, label: impl Into<String>) -> Self {
        self.section_label = label.into();
        self
    }

    /// One passage block, including its leading separator.
    pub fn passage_block(&self, text: &str) -> String {
        format!("\n\n{}:\n\"\"\"\n{}\n\"\"\"", self.section_label, text)
    }

    /// The question suffix appended after the passages.
    pub fn question_suffix(&self, query: &str) -> String {
        format!("\n\nQuestion: {query}")
    }
}

/// Result of [`assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub text: String,
    /// Number of passages attached.
    pub passages: usize,
    /// Token count of `text` under the counter's model.
    pub tokens: usize,
}

/// Append passages in order until the next one would push
/// `prompt + passage + question` over `token_budget`.
///
/// Stops at the first passage that does not fit: later passages are no more
/// relevant, so skipping ahead to a shorter one is not attempted.
pub fn assemble<'a, I>(
    template: &PromptTemplate,
    query: &str,
    passages: I,
    counter: &dyn TokenCounter,
    token_budget: i64,
) -> AssembledPrompt
where
    I: IntoIterator<Item = &'a str>,
{
    let suffix = template.question_suffix(query);
    let mut prompt = template.preamble.clone();
    let mut included = 0usize;
    let mut last_fit: Option<usize> = None;

    if token_budget > 0 {
        for passage in passages {
            let block = template.passage_block(passage);
            let trial = format!("{prompt}{block}{suffix}");
            let tokens = counter.count_tokens(&trial);
            if tokens as i64 > token_budget {
                break;
            }
            prompt.push_str(&block);
            included += 1;
            last_fit = Some(tokens);
        }
    }

    prompt.push_str(&suffix);
    let tokens = last_fit.unwrap_or_else(|| counter.count_tokens(&prompt));

    tracing::debug!(
        "🧩 Prompt assembled: {} passages, {} tokens (budget {})",
        included,
        tokens,
        token_budget
    );

    AssembledPrompt {
        text: prompt,
        passages: included,
        tokens,
    }
}
