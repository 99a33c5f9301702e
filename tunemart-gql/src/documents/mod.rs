//! Marketplace documents and their option factories
//!
//! Each operation is a unit struct implementing [`Operation`](crate::Operation).
//! The factory functions next to it build the cache key, or for mutations
//! the invalidation list.

pub mod playlists;
pub mod requests;
pub mod tracks;

use serde::{Deserialize, Serialize};

/// Artist summary embedded in tracks and requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub id: String,
    pub stage_name: String,
    #[serde(default)]
    pub avatar_image: Option<String>,
}

/// Offset pagination input shared by list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInput {
    pub skip: u32,
    pub take: u32,
}

impl PageInput {
    /// 1-based page number to skip/take
    pub fn page(page: u32, take: u32) -> Self {
        Self {
            skip: page.saturating_sub(1).saturating_mul(take),
            take,
        }
    }
}

/// Paged list envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_input() {
        assert_eq!(PageInput::page(1, 20), PageInput { skip: 0, take: 20 });
        assert_eq!(PageInput::page(3, 10), PageInput { skip: 20, take: 10 });
        assert_eq!(PageInput::page(0, 10), PageInput { skip: 0, take: 10 });
    }
}
