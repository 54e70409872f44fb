//! Weighted fuzzy index over a document set

use super::fuzzy::{FuzzyOptions, Pattern};
use crate::config::SearchKey;
use crate::error::SearchError;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Stand-in for a perfect field score so it still ranks by weight
const EPSILON: f64 = f64::EPSILON;

/// One matching document
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<D> {
    pub item: D,
    /// Position of the document in the indexed set
    pub ref_index: usize,
    /// Combined relevance, lower is better
    pub score: f64,
}

#[derive(Debug, Clone)]
struct FieldValue {
    text: String,
    /// Longer fields weigh less: 1 / sqrt(word count)
    norm: f64,
}

#[derive(Debug, Clone)]
struct IndexedKey {
    path: Vec<String>,
    /// Weight normalized so all keys sum to 1
    weight: f64,
}

/// Index built once per document set
#[derive(Debug, Clone)]
pub struct SearchIndex<D> {
    docs: Vec<D>,
    keys: Vec<IndexedKey>,
    /// `records[doc][key]` holds every string found at that key's path
    records: Vec<Vec<Vec<FieldValue>>>,
    options: FuzzyOptions,
}

impl<D: Serialize + Clone> SearchIndex<D> {
    pub fn build(docs: Vec<D>, keys: &[SearchKey], options: FuzzyOptions) -> Self {
        let total: f64 = keys.iter().map(|k| k.weight.max(0.0)).sum();
        let keys: Vec<IndexedKey> = keys
            .iter()
            .map(|k| IndexedKey {
                path: k.path.split('.').map(str::to_string).collect(),
                weight: if total > 0.0 {
                    k.weight.max(0.0) / total
                } else {
                    1.0
                },
            })
            .collect();

        let records = docs
            .iter()
            .enumerate()
            .map(|(idx, doc)| match serde_json::to_value(doc) {
                Ok(value) => keys
                    .iter()
                    .map(|key| {
                        let mut found = Vec::new();
                        collect_strings(&value, &key.path, &mut found);
                        found
                            .into_iter()
                            .map(|text| FieldValue {
                                norm: field_norm(&text),
                                text,
                            })
                            .collect()
                    })
                    .collect(),
                Err(e) => {
                    warn!("Document {} could not be indexed: {}", idx, e);
                    vec![Vec::new(); keys.len()]
                }
            })
            .collect();

        debug!("Indexed {} documents over {} keys", docs.len(), keys.len());

        Self {
            docs,
            keys,
            records,
            options,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> &[D] {
        &self.docs
    }

    /// Match `query` against every document, best first
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit<D>>, SearchError> {
        let pattern = Pattern::new(query, self.options.clone())?;

        let mut hits: Vec<SearchHit<D>> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(ref_index, fields)| {
                self.score_document(&pattern, fields).map(|score| SearchHit {
                    item: self.docs[ref_index].clone(),
                    ref_index,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then(a.ref_index.cmp(&b.ref_index))
        });
        Ok(hits)
    }

    fn score_document(&self, pattern: &Pattern, fields: &[Vec<FieldValue>]) -> Option<f64> {
        let mut total = 1.0;
        let mut matched = false;

        for (key, values) in self.keys.iter().zip(fields) {
            let best = values
                .iter()
                .filter_map(|v| pattern.score(&v.text).map(|s| (s, v.norm)))
                .min_by(|a, b| a.0.total_cmp(&b.0));

            if let Some((score, norm)) = best {
                matched = true;
                let base = if score == 0.0 && key.weight > 0.0 {
                    EPSILON
                } else {
                    score
                };
                total *= base.powf(key.weight * norm);
            }
        }

        matched.then_some(total)
    }
}

fn field_norm(text: &str) -> f64 {
    let tokens = text.split_whitespace().count().max(1);
    let norm = 1.0 / (tokens as f64).sqrt();
    (norm * 1000.0).round() / 1000.0
}

/// Walk a dotted path, descending into arrays along the way
fn collect_strings(value: &Value, path: &[String], out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_strings(item, path, out);
            }
        }
        _ => match path.split_first() {
            Some((head, rest)) => {
                if let Some(child) = value.get(head.as_str()) {
                    collect_strings(child, rest, out);
                }
            }
            None => match value {
                Value::String(s) if !s.is_empty() => out.push(s.clone()),
                Value::Number(n) => out.push(n.to_string()),
                Value::Bool(b) => out.push(b.to_string()),
                _ => {}
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(paths: &[&str]) -> Vec<SearchKey> {
        paths.iter().map(|p| SearchKey::new(*p)).collect()
    }

    #[test]
    fn test_hello_world() {
        let docs = vec![json!({"title": "Hello World"}), json!({"title": "Goodbye"})];
        let index = SearchIndex::build(docs, &keys(&["title"]), FuzzyOptions::default());

        let hits = index.search("Helo").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item["title"], "Hello World");
        assert_eq!(hits[0].ref_index, 0);

        assert!(index.search("zzz").unwrap().is_empty());
    }

    #[test]
    fn test_nested_author_name() {
        let docs = vec![
            json!({"title": "Bóng đá", "author": {"name": "Nguyễn Văn A"}}),
            json!({"title": "Kinh tế", "author": {"name": "Trần B"}}),
        ];
        let index = SearchIndex::build(
            docs,
            &keys(&["title", "author.name"]),
            FuzzyOptions::default(),
        );

        let hits = index.search("trần").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ref_index, 1);
    }

    #[test]
    fn test_array_paths() {
        let docs = vec![json!({"tags": [{"name": "economy"}, {"name": "markets"}]})];
        let index = SearchIndex::build(docs, &keys(&["tags.name"]), FuzzyOptions::default());
        assert_eq!(index.search("markets").unwrap().len(), 1);
    }

    #[test]
    fn test_exact_ranks_before_fuzzy() {
        let docs = vec![
            json!({"title": "Helm charts"}),
            json!({"title": "Hello"}),
        ];
        let index = SearchIndex::build(docs, &keys(&["title"]), FuzzyOptions::default());

        let hits = index.search("hello").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].ref_index, 1);
        assert!(hits[0].score < hits[1].score);
    }

    #[test]
    fn test_weight_breaks_ties() {
        let docs = vec![
            json!({"title": "market", "content": "x"}),
            json!({"title": "x", "content": "market"}),
        ];
        let keys = vec![
            SearchKey::weighted("title", 1.0),
            SearchKey::weighted("content", 3.0),
        ];
        let index = SearchIndex::build(docs, &keys, FuzzyOptions::default());

        let hits = index.search("market").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].ref_index, 1);
    }

    #[test]
    fn test_missing_fields_skipped() {
        let docs = vec![json!({"title": null}), json!({"other": "hello"})];
        let index = SearchIndex::build(docs, &keys(&["title"]), FuzzyOptions::default());
        assert!(index.search("hello").unwrap().is_empty());
    }

    #[test]
    fn test_field_norm() {
        assert_eq!(field_norm("one"), 1.0);
        assert_eq!(field_norm("one two three four"), 0.5);
        assert_eq!(field_norm(""), 1.0);
    }

    #[test]
    fn test_empty_index() {
        let index: SearchIndex<Value> =
            SearchIndex::build(Vec::new(), &keys(&["title"]), FuzzyOptions::default());
        assert!(index.is_empty());
        assert!(index.search("anything").unwrap().is_empty());
    }
}
