//! YAML frontmatter parsing for Markdown documents.
//!
//! Scalar keys of the frontmatter block become document metadata; the body
//! after the closing delimiter is what gets indexed.
use anyhow::{Context, Result, bail};
use serde_yaml::Value;

use crate::models::{Metadata, MetadataValue};

const DELIMITER: &str = "---";

/// Split `content` into the raw YAML block and the body that follows it.
///
/// Returns `Ok(None)` when the content has no frontmatter.
pub fn split(content: &str) -> Result<Option<(&str, &str)>> {
    let Some(first_line_end) = content.find('\n') else {
        return Ok(None);
    };
    if content[..first_line_end].trim() != DELIMITER {
        return Ok(None);
    }

    let yaml_start = first_line_end + 1;
    let mut offset = yaml_start;
    for line in content[yaml_start..].split_inclusive('\n') {
        if line.trim() == DELIMITER {
            let body_start = offset + line.len();
            return Ok(Some((&content[yaml_start..offset], &content[body_start..])));
        }
        offset += line.len();
    }

    bail!("frontmatter not closed")
}

/// Parse frontmatter from markdown content. Returns `(Option<Metadata>, body)`.
pub fn parse(content: &str) -> Result<(Option<Metadata>, String)> {
    let Some((yaml, body)) = split(content)? else {
        return Ok((None, content.to_string()));
    };

    let value: Value = if yaml.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(yaml).context("invalid YAML frontmatter")?
    };

    let mut metadata = Metadata::new();
    match value {
        Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key) = key.as_str() else { continue };
                if let Some(value) = to_metadata_value(&value) {
                    metadata.insert(key.to_string(), value);
                }
            }
        }
        Value::Null => {}
        _ => bail!("frontmatter must be a mapping"),
    }

    Ok((Some(metadata), body.to_string()))
}

/// Scalars map directly; sequences of scalars are joined with `", "`.
fn to_metadata_value(value: &Value) -> Option<MetadataValue> {
    match value {
        Value::Bool(b) => Some(MetadataValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(MetadataValue::Integer)
            .or_else(|| n.as_f64().map(MetadataValue::Float)),
        Value::String(s) => Some(MetadataValue::Text(s.clone())),
        Value::Sequence(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(to_metadata_value)
                .map(|v| v.to_string())
                .collect();
            Some(MetadataValue::Text(parts.join(", ")))
        }
        Value::Tagged(tagged) => to_metadata_value(&tagged.value),
        Value::Null | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_frontmatter() {
        let (meta, body) = parse("# Hello\n\nWorld").unwrap();
        assert!(meta.is_none());
        assert_eq!(body, "# Hello\n\nWorld");
    }

    #[test]
    fn test_parse_with_frontmatter() {
        let content = "---\ndomain: backend\nyear: 2021\ntags: [auth, db]\n---\n# Doc\n";
        let (meta, body) = parse(content).unwrap();
        let meta = meta.unwrap();
        assert_eq!(meta["domain"], MetadataValue::Text("backend".into()));
        assert_eq!(meta["year"], MetadataValue::Integer(2021));
        assert_eq!(meta["tags"], MetadataValue::Text("auth, db".into()));
        assert_eq!(body, "# Doc\n");
    }

    #[test]
    fn test_nested_mapping_ignored() {
        let content = "---\ntitle: Essay\nextra:\n  nested: 1\n---\nBody";
        let (meta, body) = parse(content).unwrap();
        let meta = meta.unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_empty_frontmatter() {
        let (meta, body) = parse("---\n---\ntext").unwrap();
        assert!(meta.unwrap().is_empty());
        assert_eq!(body, "text");
    }

    #[test]
    fn test_unclosed_frontmatter() {
        assert!(parse("---\ntitle: x\nno end").is_err());
    }

    #[test]
    fn test_dashes_mid_document_not_frontmatter() {
        let content = "Intro\n---\nmore";
        let (meta, body) = parse(content).unwrap();
        assert!(meta.is_none());
        assert_eq!(body, content);
    }
}
