//! Unsaved form state for a customer.

use b2b_core::{Customer, CustomerFields};
use serde::{Deserialize, Serialize};

/// Draft being created or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDraft {
    #[serde(flatten)]
    pub fields: CustomerFields,
    /// Comma-separated picture URLs typed by hand.
    #[serde(default)]
    pub picture_urls: String,
}

impl CustomerDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft for editing an existing record. Its pictures stay on the record
    /// and are not copied into the URL text.
    pub fn from_customer(customer: &Customer) -> Self {
        Self {
            fields: customer.fields.clone(),
            picture_urls: String::new(),
        }
    }

    pub fn manual_urls(&self) -> Vec<String> {
        parse_picture_urls(&self.picture_urls)
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

/// Split comma-separated URL text, trimming and dropping empty entries.
pub fn parse_picture_urls(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use b2b_core::OwnerId;
    use chrono::Utc;

    fn customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: b2b_core::new_v7(),
            owner: OwnerId::new("u1").unwrap(),
            fields: CustomerFields {
                first_name: "Ann".into(),
                last_name: "Lee".into(),
                ..Default::default()
            },
            pictures: vec!["https://x/1.png".into()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_picture_urls() {
        assert_eq!(
            parse_picture_urls(" https://a/1.png ,, https://a/2.png,  "),
            vec!["https://a/1.png", "https://a/2.png"]
        );
        assert!(parse_picture_urls("").is_empty());
        assert!(parse_picture_urls(" , ,").is_empty());
    }

    #[test]
    fn test_from_customer_leaves_urls_empty() {
        let draft = CustomerDraft::from_customer(&customer());
        assert_eq!(draft.fields.last_name, "Lee");
        assert!(draft.picture_urls.is_empty());
        assert!(!draft.is_blank());
    }

    #[test]
    fn test_draft_json_is_flat_camel_case() {
        let mut draft = CustomerDraft::new();
        draft.fields.street_address = "1 Main St".into();
        draft.picture_urls = "https://a/1.png".into();
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["streetAddress"], "1 Main St");
        assert_eq!(json["pictureUrls"], "https://a/1.png");
    }
}
