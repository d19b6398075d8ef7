//! Product catalog rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    /// Price in credits.
    pub price: i64,
    pub stock: i32,
    pub status: String,
    pub category_id: Option<Uuid>,
    pub featured_rank: Option<i32>,
    pub delivery_note: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_HIDDEN: &str = "hidden";
pub const STATUS_DELETED: &str = "deleted";

pub fn valid_status(status: &str) -> bool {
    matches!(status, STATUS_ACTIVE | STATUS_HIDDEN | STATUS_DELETED)
}

/// Slugs are derived from names: lowercased, non-alphanumerics collapsed
/// to single dashes. Turkish characters get their ASCII fold.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        let mapped: Option<char> = match c {
            'ç' | 'Ç' => Some('c'),
            'ğ' | 'Ğ' => Some('g'),
            'ı' | 'İ' => Some('i'),
            'ö' | 'Ö' => Some('o'),
            'ş' | 'Ş' => Some('s'),
            'ü' | 'Ü' => Some('u'),
            c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
            _ => None,
        };
        match mapped {
            Some(c) => {
                slug.push(c);
                last_dash = false;
            }
            None if !last_dash => {
                slug.push('-');
                last_dash = true;
            }
            None => {}
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Windows 11 Pro"), "windows-11-pro");
    }

    #[test]
    fn slugify_turkish() {
        assert_eq!(slugify("Yazılım Ürünleri"), "yazilim-urunleri");
        assert_eq!(slugify("Çok Güzel Şey"), "cok-guzel-sey");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  a -- b  "), "a-b");
    }

    #[test]
    fn statuses() {
        assert!(valid_status("active"));
        assert!(valid_status("hidden"));
        assert!(!valid_status("archived"));
    }
}
