use crate::error::NavError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Selection coming from the browser page: an `id`, a `title`, free `text`
/// scraped from a song tile, or any combination.
///
/// The JSON form accepts the field names the tile-scraping scripts send
/// (`titleNumber`, `number`, `name`, `rawText`, ...). Numeric ids are accepted
/// as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationQuery {
    #[serde(
        default,
        alias = "titleNumber",
        alias = "title_number",
        alias = "number",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(
        default,
        alias = "name",
        alias = "songTitle",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,

    /// Tile text such as `"001. Binary Star"`; consulted after id and title.
    #[serde(
        default,
        alias = "query",
        alias = "label",
        alias = "rawText",
        alias = "raw_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,
}

impl NavigationQuery {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Trimmed id, `None` when absent or blank.
    pub fn id(&self) -> Option<&str> {
        non_blank(self.id.as_deref())
    }

    /// Trimmed title, `None` when absent or blank.
    pub fn title(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    pub fn text(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }

    /// Reject queries that carry no id, title or text.
    pub fn validate(&self) -> Result<(), NavError> {
        if self.id().is_none() && self.title().is_none() && self.text().is_none() {
            return Err(NavError::InvalidQuery);
        }
        Ok(())
    }
}

impl fmt::Display for NavigationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = self.id() {
            parts.push(format!("id={}", id));
        }
        if let Some(title) = self.title() {
            parts.push(format!("title={:?}", title));
        }
        if let Some(text) = self.text() {
            parts.push(format!("text={:?}", text));
        }
        if parts.is_empty() {
            return write!(f, "<empty query>");
        }
        write!(f, "{}", parts.join(" "))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<StringOrNumber> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        StringOrNumber::Str(s) => s,
        StringOrNumber::Int(n) => n.to_string(),
        StringOrNumber::Float(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_treated_as_missing() {
        let query = NavigationQuery {
            id: Some("   ".into()),
            title: Some("".into()),
            text: Some(" ".into()),
        };
        assert!(query.id().is_none());
        assert!(query.title().is_none());
        assert!(query.text().is_none());
        assert!(matches!(query.validate(), Err(NavError::InvalidQuery)));

        assert!(NavigationQuery::by_title("Cradle").validate().is_ok());
        assert!(NavigationQuery::by_text("001. Cradle").validate().is_ok());
    }

    #[test]
    fn test_deserialize_aliases_and_numbers() {
        let query: NavigationQuery =
            serde_json::from_str(r#"{"titleNumber": 42, "name": "Airwave"}"#).unwrap();
        assert_eq!(query.id(), Some("42"));
        assert_eq!(query.title(), Some("Airwave"));

        let query: NavigationQuery = serde_json::from_str(r#"{"id": "s-7"}"#).unwrap();
        assert_eq!(query.id(), Some("s-7"));
        assert!(query.title.is_none());

        let query: NavigationQuery =
            serde_json::from_str(r#"{"rawText": "001. Airwave"}"#).unwrap();
        assert_eq!(query.text(), Some("001. Airwave"));
        let query: NavigationQuery = serde_json::from_str(r#"{"label": "Cradle"}"#).unwrap();
        assert_eq!(query.text(), Some("Cradle"));

        let query: NavigationQuery = serde_json::from_str("{}").unwrap();
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_display() {
        let query = NavigationQuery::by_id("7").with_title("Cradle");
        assert_eq!(query.to_string(), r#"id=7 title="Cradle""#);
    }
}
