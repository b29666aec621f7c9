use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

pub const CONTRACT_ID: &str = "fieldpress.schema_contract";
pub const CONTRACT_VERSION: &str = "1";

/// Visibility condition referencing a sibling field, wire forms `fieldId`
/// and `fieldId=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field_id: String,
    pub value: Option<String>,
}

impl Condition {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((field_id, value)) => Self {
                field_id: field_id.trim().to_string(),
                value: Some(value.trim().to_string()),
            },
            None => Self {
                field_id: raw.trim().to_string(),
                value: None,
            },
        }
    }

    /// True when this condition is keyed on the given field, regardless of
    /// whether it carries a value part.
    pub fn references(&self, field_id: &str) -> bool {
        self.field_id == field_id
    }

    /// Evaluate against an answer. The bare form is satisfied by any
    /// non-empty answer; the valued form requires an exact text match.
    pub fn matches(&self, answer: Option<&AnswerValue>) -> bool {
        match &self.value {
            Some(expected) => answer.and_then(AnswerValue::as_text) == Some(expected.as_str()),
            None => match answer {
                Some(AnswerValue::Text(text)) => !text.is_empty(),
                Some(_) => true,
                None => false,
            },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.field_id, value),
            None => write!(f, "{}", self.field_id),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Condition::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(
        default,
        rename = "showWhen",
        alias = "condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_when: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(
        default,
        rename = "showWhen",
        alias = "condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_when: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(
        default,
        rename = "showWhen",
        alias = "condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_when: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeaterField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(
        default,
        rename = "showWhen",
        alias = "condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_when: Option<Condition>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(
        default,
        rename = "showWhen",
        alias = "condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_when: Option<Condition>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(
        default,
        rename = "showWhen",
        alias = "condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_when: Option<Condition>,
}

/// One form field. The wire discriminant is the lowercase `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Field {
    Text(TextField),
    Radio(RadioField),
    Select(SelectField),
    Repeater(RepeaterField),
    Conditional(ConditionalField),
    File(FileField),
}

impl Field {
    pub fn id(&self) -> &str {
        match self {
            Field::Text(f) => &f.id,
            Field::Radio(f) => &f.id,
            Field::Select(f) => &f.id,
            Field::Repeater(f) => &f.id,
            Field::Conditional(f) => &f.id,
            Field::File(f) => &f.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Field::Text(f) => &f.label,
            Field::Radio(f) => &f.label,
            Field::Select(f) => &f.label,
            Field::Repeater(f) => &f.label,
            Field::Conditional(f) => &f.label,
            Field::File(f) => &f.label,
        }
    }

    /// Label with fallback to the field id when the label is empty.
    pub fn display_label(&self) -> &str {
        let label = self.label();
        if label.is_empty() { self.id() } else { label }
    }

    pub fn show_when(&self) -> Option<&Condition> {
        match self {
            Field::Text(f) => f.show_when.as_ref(),
            Field::Radio(f) => f.show_when.as_ref(),
            Field::Select(f) => f.show_when.as_ref(),
            Field::Repeater(f) => f.show_when.as_ref(),
            Field::Conditional(f) => f.show_when.as_ref(),
            Field::File(f) => f.show_when.as_ref(),
        }
    }

    pub fn children(&self) -> &[Field] {
        match self {
            Field::Repeater(f) => &f.fields,
            Field::Conditional(f) => &f.fields,
            _ => &[],
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Field::Text(_) => "text",
            Field::Radio(_) => "radio",
            Field::Select(_) => "select",
            Field::Repeater(_) => "repeater",
            Field::Conditional(_) => "conditional",
            Field::File(_) => "file",
        }
    }
}

/// Where a visited field sits relative to list-producing containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// Directly under a section.
    Root,
    /// Inside one or more conditional groups, no repeater above it.
    Grouped,
    /// Inside a repeater; its answers live in repeater entries, not on the area.
    Repeated,
}

/// Depth-first walk over a field tree, reporting each field with its scope.
pub fn visit_fields<'a>(fields: &'a [Field], visit: &mut impl FnMut(&'a Field, FieldScope)) {
    fn walk<'a>(
        fields: &'a [Field],
        scope: FieldScope,
        visit: &mut impl FnMut(&'a Field, FieldScope),
    ) {
        for field in fields {
            visit(field, scope);
            let child_scope = match (scope, field) {
                (FieldScope::Repeated, _) | (_, Field::Repeater(_)) => FieldScope::Repeated,
                _ => FieldScope::Grouped,
            };
            walk(field.children(), child_scope, visit);
        }
    }
    walk(fields, FieldScope::Root, visit);
}

pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// One recorded answer. Scalars, multi-select string lists, and repeater
/// entry lists all appear in the same per-area mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
    Entries(Vec<AnswerMap>),
}

impl AnswerValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[AnswerMap]> {
        match self {
            AnswerValue::Entries(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AnswerValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_yes(&self) -> bool {
        self.as_text() == Some("Yes")
    }

    /// Single-line rendering for report listings.
    pub fn display_text(&self) -> String {
        match self {
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Number(n) => format!("{}", n),
            AnswerValue::Bool(b) => format!("{}", b),
            AnswerValue::List(items) => items.join(", "),
            AnswerValue::Entries(entries) => format!("{} entries", entries.len()),
        }
    }
}

/// One inspected area's complete answer set. Unrecognized top-level keys
/// are the assessments mapping; `id`, `name` and `sequence` ride alongside
/// the answers on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sequence: u32,
    #[serde(flatten)]
    pub assessments: AnswerMap,
}

impl AreaRecord {
    pub fn answer(&self, field_id: &str) -> Option<&AnswerValue> {
        self.assessments.get(field_id)
    }

    pub fn text(&self, field_id: &str) -> Option<&str> {
        self.answer(field_id).and_then(AnswerValue::as_text)
    }

    pub fn is_yes(&self, field_id: &str) -> bool {
        self.answer(field_id).is_some_and(AnswerValue::is_yes)
    }

    pub fn entries(&self, field_id: &str) -> Option<&[AnswerMap]> {
        self.answer(field_id).and_then(AnswerValue::entries)
    }

    pub fn list(&self, field_id: &str) -> Option<&[String]> {
        self.answer(field_id).and_then(AnswerValue::as_list)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(
        default,
        rename = "showWhen",
        alias = "condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_when: Option<Condition>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub sections: Vec<Section>,
}

impl FormSchema {
    /// First section whose title contains the keyword, case-insensitive.
    pub fn section_matching(&self, keyword: &str) -> Option<&Section> {
        let needle = keyword.to_lowercase();
        self.sections
            .iter()
            .find(|section| section.title.to_lowercase().contains(&needle))
    }

    /// Stable hex fingerprint of this schema revision, recorded in report
    /// diagnostics so artifacts can be traced back to the schema that
    /// produced them.
    pub fn fingerprint_sha256(&self) -> String {
        let payload = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(CONTRACT_ID.as_bytes());
        hasher.update(b"\n");
        hasher.update(CONTRACT_VERSION.as_bytes());
        hasher.update(b"\n");
        hasher.update(&payload);
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            use std::fmt::Write;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}
