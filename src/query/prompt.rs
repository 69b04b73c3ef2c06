//! Bounded-length prompt assembly.
use crate::index::SearchHit;

const HEADER: &str = "Context information is below.\n---------------------\n";
const BARE_PREFIX: &str = "Query: ";
const BARE_SUFFIX: &str = "\nAnswer:";
const FOOTER: &str = "---------------------\nGiven the context information and not prior knowledge, answer the query.\n";

/// A prompt plus how many of the offered hits made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    /// The first `included` hits, in rank order, are in `text`.
    pub included: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    max_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Question with no context, for the forward-question fallback.
    ///
    /// The question is cut short if the prompt would exceed the budget.
    pub fn bare(&self, question: &str) -> String {
        let fixed = BARE_PREFIX.chars().count() + BARE_SUFFIX.chars().count();
        let room = self.max_chars.saturating_sub(fixed);
        let question: String = question.chars().take(room).collect();
        format!("{BARE_PREFIX}{question}{BARE_SUFFIX}")
    }

    /// Fill the context with hits in rank order until the budget runs out.
    ///
    /// The best hit is truncated rather than dropped when it alone is too
    /// long; later hits are only added whole. Returns `included == 0` when
    /// not even a truncated first hit fits.
    pub fn build(&self, question: &str, hits: &[SearchHit<'_>]) -> Prompt {
        let tail = format!("{FOOTER}{BARE_PREFIX}{question}{BARE_SUFFIX}");
        let fixed = HEADER.chars().count() + tail.chars().count();
        let mut budget = self.max_chars.saturating_sub(fixed);

        let mut context = String::new();
        let mut included = 0;
        for (rank, hit) in hits.iter().enumerate() {
            let label = format!("[{}] source: {}\n", rank + 1, hit.entry.chunk.document_id);
            let text = &hit.entry.chunk.text;
            let needed = label.chars().count() + text.chars().count() + 2;

            if needed <= budget {
                context.push_str(&label);
                context.push_str(text);
                context.push_str("\n\n");
                budget -= needed;
                included += 1;
                continue;
            }

            if rank == 0 {
                let room = budget.saturating_sub(label.chars().count() + 2);
                if room > 0 {
                    context.push_str(&label);
                    context.extend(text.chars().take(room));
                    context.push_str("\n\n");
                    included = 1;
                }
            }
            break;
        }

        Prompt {
            text: format!("{HEADER}{context}{tail}"),
            included,
        }
    }
}
