//! News data models shared by the fetch and search layers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Article identifier; backends send either numbers or strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleId::Number(n) => write!(f, "{}", n),
            ArticleId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Feeds spell this `avarta`; `avatar` is accepted too
    #[serde(
        default,
        rename = "avarta",
        alias = "avatar",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<Avatar>,
}

/// A news article as listed and searched by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ArticleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

impl Article {
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref()?.name.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_posts: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// `GET /api/category/:slug` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostsByCategoryResponse {
    pub category: Category,
    pub pagination: Pagination,
    pub posts: Vec<Article>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_article_from_feed() {
        let article: Article = serde_json::from_value(json!({
            "id": 12,
            "title": "Giá vàng hôm nay",
            "pubDate": "2024-05-01T08:00:00Z",
            "author": {"name": "Minh", "avarta": {"src": "/a.png"}},
            "featured": true
        }))
        .unwrap();

        assert_eq!(article.id, Some(ArticleId::Number(12)));
        assert_eq!(article.pub_date.as_deref(), Some("2024-05-01T08:00:00Z"));
        assert_eq!(article.author_name(), Some("Minh"));
        assert_eq!(
            article.author.unwrap().avatar.unwrap().src.as_deref(),
            Some("/a.png")
        );
    }

    #[test]
    fn test_string_id_and_sparse_fields() {
        let article: Article = serde_json::from_value(json!({"id": "abc"})).unwrap();
        assert_eq!(article.id.as_ref().map(|i| i.to_string()).as_deref(), Some("abc"));
        assert_eq!(serde_json::to_value(&article).unwrap(), json!({"id": "abc"}));
    }

    #[test]
    fn test_posts_by_category() {
        let response: PostsByCategoryResponse = serde_json::from_value(json!({
            "category": {"id": "1", "name": "Thể thao", "slug": "the-thao", "description": null},
            "pagination": {"currentPage": 1, "totalPages": 3, "totalPosts": 25, "hasNext": true, "hasPrev": false},
            "posts": [{"title": "A"}]
        }))
        .unwrap();

        assert_eq!(response.category.slug, "the-thao");
        assert!(response.pagination.has_next);
        assert_eq!(response.posts.len(), 1);
    }
}
