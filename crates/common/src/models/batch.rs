//! Keyword batch model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MAX_KEYWORDS_PER_BATCH;

/// Batch status enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of keywords queued for article generation against one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordBatch {
    pub id: String,

    /// Processing order is list order
    pub keywords: Vec<String>,

    pub category_id: String,

    pub status: BatchStatus,

    pub created_at: DateTime<Utc>,

    /// Keywords attempted so far, successful or not
    pub processed_count: usize,

    pub total_count: usize,

    /// Why the last run stopped working on this batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl KeywordBatch {
    /// Create a pending batch from already-normalized keywords
    pub fn new(keywords: Vec<String>, category_id: String) -> Self {
        let total_count = keywords.len();
        Self {
            id: Uuid::now_v7().to_string(),
            keywords,
            category_id,
            status: BatchStatus::Pending,
            created_at: Utc::now(),
            processed_count: 0,
            total_count,
            last_error: None,
        }
    }

    /// Eligible for selection by the scheduler
    pub fn is_active(&self) -> bool {
        matches!(self.status, BatchStatus::Pending | BatchStatus::Processing)
    }

    pub fn is_exhausted(&self) -> bool {
        self.processed_count >= self.total_count
    }

    /// Keywords not yet attempted, in processing order
    pub fn remaining(&self) -> &[String] {
        let start = self.processed_count.min(self.keywords.len());
        &self.keywords[start..]
    }

    /// Calculate progress percentage
    pub fn progress_percent(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            (self.processed_count as f64 / self.total_count as f64) * 100.0
        }
    }
}

/// Trim keywords, drop blank lines, and keep at most the first 100.
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .take(MAX_KEYWORDS_PER_BATCH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_blank_and_truncates() {
        let mut lines: Vec<String> = Vec::new();
        for i in 0..150 {
            if i % 7 == 3 {
                lines.push("   ".to_string());
            } else {
                lines.push(format!(" keyword {} ", i));
            }
        }

        let keywords = normalize_keywords(&lines);
        assert_eq!(keywords.len(), 100);
        assert_eq!(keywords[0], "keyword 0");
        assert!(keywords.iter().all(|k| !k.trim().is_empty()));
    }

    #[test]
    fn test_remaining_follows_progress() {
        let mut batch = KeywordBatch::new(
            vec!["a".into(), "b".into(), "c".into()],
            "cat-1".into(),
        );
        assert_eq!(batch.remaining().len(), 3);
        assert!(batch.is_active());

        batch.processed_count = 2;
        assert_eq!(batch.remaining(), &["c".to_string()]);
        assert!((batch.progress_percent() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_serializes_camel_case() {
        let batch = KeywordBatch::new(vec!["mortgage calculator".into()], "cat-1".into());
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["categoryId"], "cat-1");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["totalCount"], 1);
        assert!(json.get("lastError").is_none());
    }
}
