use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::StitchError;

/// Ordered document metadata rendered verbatim as YAML front matter.
///
/// The stitcher never interprets these keys; they exist for the downstream
/// renderer (title page, geometry, pandoc's own table of contents).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct Metadata(#[schemars(with = "serde_json::Map<String, serde_json::Value>")] Mapping);

impl Default for Metadata {
    fn default() -> Self {
        let mut map = Mapping::new();
        map.insert("title".into(), "Compiled Document".into());
        map.insert("subtitle".into(), "".into());
        map.insert("author".into(), "".into());
        map.insert("date".into(), "".into());
        map.insert("license".into(), "".into());
        map.insert("geometry".into(), "margin=1in".into());
        map.insert("fontsize".into(), "12pt".into());
        map.insert("toc".into(), true.into());
        map.insert("toc-depth".into(), 3_u64.into());
        Self(map)
    }
}

impl Metadata {
    pub fn empty() -> Self {
        Self(Mapping::new())
    }

    pub fn from_mapping(map: Mapping) -> Self {
        Self(map)
    }

    /// Sets `key`, keeping its original position when it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(Value::String(key.into()), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value of `key` as a string when it is a non-empty scalar.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rendered_entries().next().is_none()
    }

    /// Overlays `other` on top of `self`: existing keys keep their position,
    /// new keys are appended in `other`'s order.
    pub fn merged_with(&self, other: &Metadata) -> Metadata {
        let mut merged = self.0.clone();
        for (key, value) in &other.0 {
            merged.insert(key.clone(), value.clone());
        }
        Metadata(merged)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    /// Renders the `---` delimited front matter block. Null values and empty
    /// strings are left out; an empty mapping renders nothing at all.
    pub fn render(&self) -> Result<String, StitchError> {
        let filtered: Mapping = self
            .rendered_entries()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if filtered.is_empty() {
            return Ok(String::new());
        }

        let yaml = serde_yaml::to_string(&filtered)
            .map_err(|err| StitchError::from(err).context("render front matter"))?;
        let mut out = String::with_capacity(yaml.len() + 8);
        out.push_str("---\n");
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n");
        Ok(out)
    }

    fn rendered_entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter().filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
    }
}

/// Borrowed slices of a document split into front matter YAML and body.
pub struct FrontMatterSplit<'a> {
    pub yaml: &'a str,
    pub body: &'a str,
}

/// Attempts to split raw markdown content into YAML front matter and body.
pub fn split_front_matter(content: &str) -> Result<FrontMatterSplit<'_>, StitchError> {
    let stripped = content.trim_start_matches('\u{feff}');
    let Some(rest) = stripped.strip_prefix("---") else {
        return Err(StitchError::Serialization(
            "missing front matter delimiter (---)".into(),
        ));
    };

    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .ok_or_else(|| {
            StitchError::Serialization("missing newline after front matter start".into())
        })?;

    if let Some(idx) = rest.find("\n---") {
        let yaml = rest[..idx].trim_end();
        let after = &rest[idx + 4..]; // skip `\n---`
        let body = after
            .strip_prefix('\n')
            .or_else(|| after.strip_prefix("\r\n"))
            .unwrap_or(after);
        Ok(FrontMatterSplit { yaml, body })
    } else {
        Err(StitchError::Serialization(
            "missing closing front matter delimiter (---)".into(),
        ))
    }
}

/// Number of leading lines occupied by a front matter block, or zero when the
/// document has none. A `---` pair around anything but a YAML mapping is a
/// pair of thematic breaks, not front matter.
pub fn front_matter_line_count(content: &str) -> usize {
    let body = strip_front_matter(content);
    let consumed = content.len() - body.len();
    content[..consumed].lines().count()
}

/// The document without its leading YAML front matter block, if it has one.
pub fn strip_front_matter(content: &str) -> &str {
    match split_front_matter(content) {
        Ok(split) if is_yaml_mapping(split.yaml) => split.body,
        _ => content,
    }
}

fn is_yaml_mapping(yaml: &str) -> bool {
    matches!(serde_yaml::from_str::<Value>(yaml), Ok(Value::Mapping(_)))
}
