//! Article and category models
//!
//! Mirrors the JSON shape of the REST CRUD API (snake_case columns).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Published,
}

/// Externally-owned category a batch is bound to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// Article write payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub hero_image: String,
    pub content: String,
    pub author: String,
    pub publish_date: DateTime<Utc>,
    pub category_id: String,
    pub status: ArticleStatus,
    pub word_count: usize,
    pub disable_ads: bool,
}

/// Stored article as returned by the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(deserialize_with = "lenient::string")]
    pub category_id: String,
    pub status: ArticleStatus,
    #[serde(default, deserialize_with = "lenient::count")]
    pub word_count: usize,
    #[serde(default)]
    pub disable_ads: bool,
}

impl Article {
    /// Build the stored record for a payload the store accepted
    pub fn from_new(id: impl Into<String>, new: NewArticle) -> Self {
        Self {
            id: id.into(),
            title: new.title,
            slug: new.slug,
            excerpt: new.excerpt,
            content: new.content,
            author: new.author,
            category_id: new.category_id,
            status: new.status,
            word_count: new.word_count,
            disable_ads: new.disable_ads,
        }
    }
}

/// The PHP API hands back numeric columns either as JSON numbers or as
/// strings depending on the PDO driver settings.
mod lenient {
    use serde::{de::Error, Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("expected string or number, got {}", other))),
        }
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| D::Error::custom("expected a non-negative count")),
            Value::String(s) => s.trim().parse().map_err(D::Error::custom),
            Value::Null => Ok(0),
            other => Err(D::Error::custom(format!("expected count, got {}", other))),
        }
    }
}

/// Lowercase the title and collapse every run of characters outside
/// `[a-z0-9]` into a single dash, trimming dashes at both ends.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("Personal Loans 2025: Complete Guide to Finding the Best Rates"),
            "personal-loans-2025-complete-guide-to-finding-the-best-rates"
        );
        assert_eq!(slugify("  --Best   Rates!!  "), "best-rates");
        assert_eq!(slugify("Crédit Cards"), "cr-dit-cards");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn test_new_article_uses_snake_case() {
        let article = NewArticle {
            title: "Mortgage Calculator Guide".into(),
            slug: "mortgage-calculator-guide".into(),
            excerpt: "Work out your payments.".into(),
            hero_image: String::new(),
            content: "<p>Body</p>".into(),
            author: crate::DEFAULT_AUTHOR.into(),
            publish_date: Utc::now(),
            category_id: "cat-1".into(),
            status: ArticleStatus::Published,
            word_count: 1,
            disable_ads: false,
        };

        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["category_id"], "cat-1");
        assert_eq!(json["status"], "published");
        assert_eq!(json["disable_ads"], false);
        assert_eq!(json["hero_image"], "");
    }

    #[test]
    fn test_article_accepts_php_row_shapes() {
        let row = serde_json::json!({
            "id": 17,
            "title": "Best Online Banks",
            "slug": "best-online-banks",
            "category_id": "3",
            "status": "published",
            "word_count": "1250",
            "disable_ads": false
        });

        let article: Article = serde_json::from_value(row).unwrap();
        assert_eq!(article.id, "17");
        assert_eq!(article.category_id, "3");
        assert_eq!(article.word_count, 1250);
        assert!(article.excerpt.is_empty());
    }
}
