//! Task enrichment: keyword, scope, and recall-query extraction.
//!
//! A pure function of a task's title and description given a scope
//! configuration. Identical input always produces identical output, so
//! enrichment can run at generation time or be replayed later.

use crate::domain::models::ScopeConfig;

/// Default scope assigned when no configured scope matches.
pub const DEFAULT_SCOPE: &str = "general";

/// Words carrying no signal for scope or keyword extraction.
///
/// This list is closed; extending it changes scope classification for
/// existing tasks.
pub(crate) const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "could", "did", "do",
    "does", "for", "from", "had", "has", "have", "how", "if", "in", "into", "is", "it", "its",
    "may", "might", "must", "no", "not", "of", "on", "or", "our", "shall", "should", "so", "some",
    "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "to", "up", "us", "use", "used", "using", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Tokenise free text: lowercase, non-alphanumerics to spaces.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

/// Unique tokens of at least `min_len` characters, stopwords removed,
/// first-seen order preserved.
fn significant_tokens(tokens: &[String], min_len: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .iter()
        .filter(|t| t.chars().count() >= min_len && !is_stopword(t))
        .filter(|t| seen.insert((*t).clone()))
        .cloned()
        .collect()
}

/// Result of enriching one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEnrichment {
    pub scope: String,
    pub keywords: Vec<String>,
    pub suggested_recall_queries: Vec<String>,
}

/// Deterministic keyword/scope/recall-query extractor.
pub struct TaskEnricher {
    config: ScopeConfig,
}

impl TaskEnricher {
    pub fn new(config: ScopeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Extract scope, keywords and recall queries from a task's title
    /// and description.
    pub fn enrich(&self, title: &str, description: &str) -> TaskEnrichment {
        let tokens = tokenize(&format!("{title} {description}"));

        let scope_tokens = significant_tokens(&tokens, 2);
        let keyword_tokens = significant_tokens(&tokens, self.config.min_word_len);

        let keywords: Vec<String> = keyword_tokens
            .into_iter()
            .take(self.config.max_keywords)
            .collect();

        let scope = self.classify_scope(&scope_tokens);
        let suggested_recall_queries = self.recall_queries(&scope, &keywords, title);

        TaskEnrichment {
            scope,
            keywords,
            suggested_recall_queries,
        }
    }

    /// Scope with the most keyword hits; ties broken by definition
    /// order, zero hits everywhere falls back to the default scope.
    fn classify_scope(&self, scope_tokens: &[String]) -> String {
        let token_set: std::collections::HashSet<&str> =
            scope_tokens.iter().map(String::as_str).collect();

        let mut best: Option<(&str, usize)> = None;
        for def in &self.config.scopes {
            let count = def
                .keywords
                .iter()
                .filter(|k| token_set.contains(k.as_str()))
                .count();
            if count > 0 && best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((&def.name, count));
            }
        }

        best.map_or_else(|| DEFAULT_SCOPE.to_string(), |(name, _)| name.to_string())
    }

    fn recall_queries(&self, scope: &str, keywords: &[String], title: &str) -> Vec<String> {
        let mut queries = vec![format!("{scope} patterns constraints decisions")];

        if !keywords.is_empty() {
            queries.push(
                keywords
                    .iter()
                    .take(5)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" "),
            );
        }

        let title_tokens = significant_tokens(&tokenize(title), self.config.min_word_len);
        if !title_tokens.is_empty() {
            let title_query = title_tokens
                .into_iter()
                .take(4)
                .collect::<Vec<_>>()
                .join(" ");
            if !queries.contains(&title_query) {
                queries.push(title_query);
            }
        }

        queries
    }
}

impl Default for TaskEnricher {
    fn default() -> Self {
        Self::new(ScopeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_punctuation_and_lowercases() {
        assert_eq!(
            tokenize("Add OAuth2.0-based login!"),
            vec!["add", "oauth2", "0", "based", "login"]
        );
    }

    #[test]
    fn enrichment_is_deterministic() {
        let enricher = TaskEnricher::default();
        let a = enricher.enrich("Add database migration", "Create the schema for user tables");
        let b = enricher.enrich("Add database migration", "Create the schema for user tables");
        assert_eq!(a, b);
    }

    #[test]
    fn scope_classification_picks_best_match() {
        let enricher = TaskEnricher::default();
        let enrichment = enricher.enrich(
            "Add database migration",
            "Create the schema and run the sql migration against the table",
        );
        assert_eq!(enrichment.scope, "database");
    }

    #[test]
    fn unmatched_text_falls_back_to_general() {
        let enricher = TaskEnricher::default();
        let enrichment = enricher.enrich("Polish wording", "Tidy sentence flow everywhere");
        assert_eq!(enrichment.scope, DEFAULT_SCOPE);
    }

    #[test]
    fn keywords_respect_cap_and_order() {
        let enricher = TaskEnricher::default();
        let enrichment = enricher.enrich(
            "alpha bravo charlie delta echo foxtrot golf hotel india juliett kilo lima",
            "",
        );
        assert_eq!(enrichment.keywords.len(), 10);
        assert_eq!(enrichment.keywords[0], "alpha");
        assert_eq!(enrichment.keywords[9], "juliett");
    }

    #[test]
    fn stopwords_are_dropped() {
        let enricher = TaskEnricher::default();
        let enrichment = enricher.enrich("Should have been with those", "");
        assert!(enrichment.keywords.is_empty());
    }

    #[test]
    fn recall_queries_shape() {
        let enricher = TaskEnricher::default();
        let enrichment = enricher.enrich("Add caching layer", "Introduce memoization for hot paths");
        assert_eq!(
            enrichment.suggested_recall_queries[0],
            format!("{} patterns constraints decisions", enrichment.scope)
        );
        // Second query is the first five keywords joined.
        assert_eq!(
            enrichment.suggested_recall_queries[1],
            enrichment
                .keywords
                .iter()
                .take(5)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        );
        // Title-derived query appears when distinct from the keyword query.
        assert!(enrichment
            .suggested_recall_queries
            .iter()
            .any(|q| q.contains("caching")));
    }
}
