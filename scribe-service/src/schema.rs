//! Form schema handed over by the host.
//!
//! Host field ids never reach the model. Leaf fields are flattened in
//! document order and addressed as `q0..qN`; [`FieldBatch::map_values`]
//! translates the answer back.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ScribeError, ScribeResult};

/// Name of the structured-output function / JSON schema sent upstream.
pub const EXTRACTION_FUNCTION_NAME: &str = "process_ai_form_fill";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSchema(pub Vec<Questionnaire>);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FormNode>,
}

/// Either a nested questionnaire or a leaf field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormNode {
    Group(Questionnaire),
    Field(FormField),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_type: Option<String>,
    #[serde(default)]
    pub repeats: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Explicit JSON schema; used verbatim when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    #[serde(default)]
    pub id: Value,
    pub text: String,
}

impl FormField {
    pub fn new(id: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type: Some(field_type.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options
            .into_iter()
            .enumerate()
            .map(|(i, text)| FieldOption {
                id: Value::from(i),
                text: text.into(),
            })
            .collect();
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeats = true;
        self
    }
}

/// Leaf field with its position in the form
#[derive(Debug, Clone, Copy)]
pub struct LeafField<'a> {
    pub index: usize,
    pub path: &'a [String],
    pub field: &'a FormField,
}

impl FormSchema {
    pub fn new(questionnaires: Vec<Questionnaire>) -> Self {
        Self(questionnaires)
    }

    /// Single questionnaire holding the given fields.
    pub fn from_fields(title: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self(vec![Questionnaire {
            title: Some(title.into()),
            description: None,
            fields: fields.into_iter().map(FormNode::Field).collect(),
        }])
    }

    pub fn from_json(value: Value) -> ScribeResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| ScribeError::invalid_format(format!("invalid form schema: {}", e)))
    }

    pub fn field_count(&self) -> usize {
        self.flatten().len()
    }

    pub fn field_ids(&self) -> Vec<String> {
        self.flatten()
            .into_iter()
            .map(|(_, field)| field.id.clone())
            .collect()
    }

    pub fn validate(&self) -> ScribeResult<()> {
        let leaves = self.flatten();
        if leaves.is_empty() {
            return Err(ScribeError::missing_field("form schema has no fields"));
        }

        let mut seen = HashSet::new();
        for (_, field) in &leaves {
            if field.id.trim().is_empty() {
                return Err(ScribeError::missing_field("form field without an id"));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(ScribeError::invalid_input(format!(
                    "duplicate form field id \"{}\"",
                    field.id
                )));
            }
        }
        Ok(())
    }

    /// Split the leaf fields into extraction batches.
    ///
    /// `max_fields` of `None` keeps the whole form in one batch.
    pub fn extraction_plan(&self, max_fields: Option<usize>) -> Vec<FieldBatch> {
        let entries: Vec<BatchEntry> = self
            .flatten()
            .into_iter()
            .enumerate()
            .map(|(index, (path, field))| {
                BatchEntry::new(LeafField {
                    index,
                    path: &path,
                    field,
                })
            })
            .collect();

        let size = max_fields.filter(|n| *n > 0).unwrap_or(entries.len().max(1));
        entries
            .chunks(size)
            .map(|chunk| FieldBatch {
                entries: chunk.to_vec(),
            })
            .collect()
    }

    fn flatten(&self) -> Vec<(Vec<String>, &FormField)> {
        fn walk<'a>(
            nodes: &'a [FormNode],
            path: &mut Vec<String>,
            out: &mut Vec<(Vec<String>, &'a FormField)>,
        ) {
            for node in nodes {
                match node {
                    FormNode::Field(field) => out.push((path.clone(), field)),
                    FormNode::Group(group) => {
                        let pushed = push_title(path, group);
                        walk(&group.fields, path, out);
                        if pushed {
                            path.pop();
                        }
                    }
                }
            }
        }

        let mut out = Vec::new();
        let mut path = Vec::new();
        for questionnaire in &self.0 {
            let pushed = push_title(&mut path, questionnaire);
            walk(&questionnaire.fields, &mut path, &mut out);
            if pushed {
                path.pop();
            }
        }
        out
    }
}

fn push_title(path: &mut Vec<String>, questionnaire: &Questionnaire) -> bool {
    match questionnaire.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => {
            path.push(title.to_string());
            true
        }
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Model-facing key, `q{index}`
    pub key: String,
    pub field_id: String,
    pub schema: Value,
    /// Expected `{value, note}` shape; `None` for explicit schemas.
    shape: Option<AnswerShape>,
}

impl BatchEntry {
    fn new(leaf: LeafField<'_>) -> Self {
        Self {
            key: format!("q{}", leaf.index),
            field_id: leaf.field.id.clone(),
            schema: field_schema(&leaf),
            shape: leaf.field.schema.is_none().then(|| AnswerShape::of(leaf.field)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ValueKind {
    fn of(field: &FormField) -> Self {
        if !field.options.is_empty() {
            return ValueKind::String;
        }
        match field.field_type.as_deref().unwrap_or("string") {
            "integer" => ValueKind::Integer,
            "decimal" | "number" | "quantity" => ValueKind::Number,
            "boolean" => ValueKind::Boolean,
            _ => ValueKind::String,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Integer => value.as_f64().is_some_and(|n| n.fract() == 0.0),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ValueKind::String => "a string",
            ValueKind::Integer => "an integer",
            ValueKind::Number => "a number",
            ValueKind::Boolean => "a boolean",
        }
    }
}

/// Answer shape of a field whose schema was derived here.
#[derive(Debug, Clone, PartialEq)]
struct AnswerShape {
    kind: ValueKind,
    options: Vec<String>,
    repeats: bool,
}

impl AnswerShape {
    fn of(field: &FormField) -> Self {
        Self {
            kind: ValueKind::of(field),
            options: field.options.iter().map(|o| o.text.clone()).collect(),
            repeats: field.repeats,
        }
    }

    fn check(&self, answer: &Value) -> Result<(), String> {
        let object = answer
            .as_object()
            .ok_or_else(|| format!("expected a {{value, note}} object, got {}", json_kind(answer)))?;
        if let Some(key) = object.keys().find(|k| k.as_str() != "value" && k.as_str() != "note") {
            return Err(format!("unexpected key \"{}\"", key));
        }
        match object.get("note") {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(other) => return Err(format!("note must be a string, got {}", json_kind(other))),
        }
        match object.get("value") {
            None | Some(Value::Null) => Ok(()),
            Some(Value::Array(items)) if self.repeats => {
                items.iter().try_for_each(|item| self.check_scalar(item))
            }
            Some(value) if self.repeats => {
                Err(format!("value must be an array, got {}", json_kind(value)))
            }
            Some(value) => self.check_scalar(value),
        }
    }

    fn check_scalar(&self, value: &Value) -> Result<(), String> {
        if !self.kind.accepts(value) {
            return Err(format!(
                "value must be {}, got {}",
                self.kind.describe(),
                json_kind(value)
            ));
        }
        match value.as_str() {
            Some(text) if !self.options.is_empty() && !self.options.iter().any(|o| o == text) => {
                Err(format!("\"{}\" is not one of the options", text))
            }
            _ => Ok(()),
        }
    }
}

/// Fields sent in one extraction call
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBatch {
    pub entries: Vec<BatchEntry>,
}

impl FieldBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Output schema for the batch.
    ///
    /// `strict` is the OpenAI structured-output flavour: every property
    /// required and no additional properties. Gemini function declarations
    /// get the relaxed form.
    pub fn json_schema(&self, strict: bool) -> Value {
        let properties: Map<String, Value> = self
            .entries
            .iter()
            .map(|e| (e.key.clone(), e.schema.clone()))
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if strict {
            let required: Vec<&str> = self.entries.iter().map(|e| e.key.as_str()).collect();
            schema["required"] = json!(required);
            schema["additionalProperties"] = Value::Bool(false);
        }
        schema
    }

    /// Translate a completion keyed by `qN` back to host field ids.
    ///
    /// Keys outside the batch and empty answers are dropped, so the result
    /// only ever names fields of this batch. Answers to derived schemas must
    /// match their `{value, note}` shape, and a non-empty object must name
    /// at least one key of the batch.
    pub fn map_values(&self, completion: &Value) -> Result<BTreeMap<String, Value>, String> {
        let object = completion
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", json_kind(completion)))?;

        if !object.is_empty() && !self.entries.iter().any(|e| object.contains_key(&e.key)) {
            return Err("completion names none of the requested fields".to_string());
        }

        let mut mapped = BTreeMap::new();
        for entry in &self.entries {
            let Some(value) = object.get(&entry.key).filter(|v| !v.is_null()) else {
                continue;
            };
            if let Some(shape) = &entry.shape {
                shape
                    .check(value)
                    .map_err(|reason| format!("{} ({}): {}", entry.key, entry.field_id, reason))?;
            }
            if !is_empty_answer(value) {
                mapped.insert(entry.field_id.clone(), value.clone());
            }
        }
        Ok(mapped)
    }
}

fn is_empty_answer(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.values().all(Value::is_null),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn field_schema(leaf: &LeafField<'_>) -> Value {
    let field = leaf.field;
    if let Some(explicit) = &field.schema {
        return explicit.clone();
    }

    let mut value = scalar_schema(field);
    value = if field.repeats {
        json!({ "type": ["array", "null"], "items": value })
    } else {
        nullable(value)
    };

    json!({
        "type": ["object", "null"],
        "description": describe(leaf),
        "properties": {
            "value": value,
            "note": {
                "type": ["string", "null"],
                "description": "Extra context that does not fit in value, otherwise null",
            },
        },
        "required": ["value", "note"],
        "additionalProperties": false,
    })
}

fn scalar_schema(field: &FormField) -> Value {
    let kind = field.field_type.as_deref().unwrap_or("string");
    if !field.options.is_empty() {
        let texts: Vec<&str> = field.options.iter().map(|o| o.text.as_str()).collect();
        return json!({ "type": "string", "enum": texts });
    }
    match kind {
        "integer" => json!({ "type": "integer" }),
        "decimal" | "number" | "quantity" => json!({ "type": "number" }),
        "boolean" => json!({ "type": "boolean" }),
        "date" => json!({ "type": "string", "description": "YYYY-MM-DD format" }),
        "dateTime" | "datetime" => json!({ "type": "string", "description": "YYYY-MM-DDTHH:mm format" }),
        "time" => json!({ "type": "string", "description": "HH:mm format" }),
        _ => json!({ "type": "string" }),
    }
}

fn nullable(mut schema: Value) -> Value {
    if let Some(kind) = schema.get("type").and_then(Value::as_str).map(str::to_string) {
        schema["type"] = json!([kind, "null"]);
    }
    if let Some(options) = schema.get_mut("enum").and_then(Value::as_array_mut) {
        options.push(Value::Null);
    }
    schema
}

fn describe(leaf: &LeafField<'_>) -> String {
    let field = leaf.field;
    let name = field.friendly_name.as_deref().unwrap_or(&field.id);
    let mut description = if leaf.path.is_empty() {
        name.to_string()
    } else {
        format!("{} > {}", leaf.path.join(" > "), name)
    };
    if let Some(structured) = &field.structured_type {
        description.push_str(&format!(" ({})", structured));
    }
    match &field.current {
        Some(Value::Null) | None => {}
        Some(current) => description.push_str(&format!(". Current value: {}", current)),
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals() -> FormSchema {
        serde_json::from_value(json!([
            {
                "title": "Vitals",
                "fields": [
                    { "id": "spo2", "friendlyName": "SpO2", "type": "integer" },
                    {
                        "title": "Blood pressure",
                        "fields": [
                            { "id": "bp-sys", "type": "integer", "current": 120 },
                            { "id": "bp-dia", "type": "integer" }
                        ]
                    }
                ]
            },
            {
                "title": "Assessment",
                "fields": [
                    { "id": "triage", "type": "choice", "options": [
                        { "id": 1, "text": "Urgent" }, { "id": 2, "text": "Routine" }
                    ]},
                    { "id": "symptoms", "type": "string", "repeats": true }
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_flatten_in_document_order() {
        assert_eq!(
            vitals().field_ids(),
            vec!["spo2", "bp-sys", "bp-dia", "triage", "symptoms"]
        );
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        assert!(vitals().validate().is_ok());
        assert!(FormSchema::default().validate().unwrap_err().is_validation());

        let dup = FormSchema::from_fields(
            "Dup",
            vec![FormField::new("a", "string"), FormField::new("a", "integer")],
        );
        assert!(dup.validate().unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_plan_uses_global_indices() {
        let plan = vitals().extraction_plan(Some(2));
        assert_eq!(plan.len(), 3);
        let keys: Vec<&str> = plan[2].entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["q4"]);
        assert_eq!(vitals().extraction_plan(None).len(), 1);
    }

    #[test]
    fn test_strict_schema_requires_all_keys() {
        let batch = &vitals().extraction_plan(None)[0];
        let schema = batch.json_schema(true);
        assert_eq!(schema["required"].as_array().unwrap().len(), 5);
        assert_eq!(schema["additionalProperties"], json!(false));

        let relaxed = batch.json_schema(false);
        assert!(relaxed.get("required").is_none());
    }

    #[test]
    fn test_derived_field_schemas() {
        let batch = &vitals().extraction_plan(None)[0];
        let bp = &batch.entries[1].schema;
        assert_eq!(bp["properties"]["value"]["type"], json!(["integer", "null"]));
        let description = bp["description"].as_str().unwrap();
        assert!(description.starts_with("Vitals > Blood pressure > bp-sys"));
        assert!(description.contains("Current value: 120"));

        let triage = &batch.entries[3].schema;
        assert_eq!(triage["properties"]["value"]["enum"], json!(["Urgent", "Routine", null]));

        let symptoms = &batch.entries[4].schema;
        assert_eq!(symptoms["properties"]["value"]["type"], json!(["array", "null"]));
        assert_eq!(symptoms["properties"]["value"]["items"]["type"], json!("string"));
    }

    #[test]
    fn test_explicit_schema_is_kept() {
        let mut field = FormField::new("custom", "string");
        field.schema = Some(json!({ "type": "string", "description": "free" }));
        let plan = FormSchema::from_fields("Custom", vec![field]).extraction_plan(None);
        assert_eq!(plan[0].entries[0].schema, json!({ "type": "string", "description": "free" }));
    }

    #[test]
    fn test_map_values_drops_unknown_and_empty() {
        let batch = &vitals().extraction_plan(None)[0];
        let mapped = batch
            .map_values(&json!({
                "q0": { "value": 97, "note": null },
                "q1": null,
                "q2": { "value": null, "note": null },
                "q3": { "value": "Urgent", "note": "came in by ambulance" },
                "q99": { "value": "ghost", "note": null },
            }))
            .unwrap();

        assert_eq!(mapped.keys().collect::<Vec<_>>(), vec!["spo2", "triage"]);
        assert_eq!(mapped["spo2"], json!({ "value": 97, "note": null }));
    }

    #[test]
    fn test_map_values_rejects_wrong_shapes() {
        let batch = &vitals().extraction_plan(None)[0];

        let err = batch.map_values(&json!({ "q0": "ninety-four" })).unwrap_err();
        assert!(err.starts_with("q0 (spo2)"), "{}", err);

        let err = batch
            .map_values(&json!({ "q3": { "value": "Maybe", "note": null } }))
            .unwrap_err();
        assert!(err.contains("not one of the options"), "{}", err);

        let err = batch
            .map_values(&json!({ "q3": { "value": "Urgent", "note": 7 } }))
            .unwrap_err();
        assert!(err.contains("note must be a string"), "{}", err);

        let err = batch
            .map_values(&json!({ "q4": { "value": "cough", "note": null } }))
            .unwrap_err();
        assert!(err.contains("must be an array"), "{}", err);

        let mapped = batch
            .map_values(&json!({
                "q0": { "value": 94.0, "note": null },
                "q4": { "value": ["cough", "fever"], "note": null },
            }))
            .unwrap();
        assert_eq!(mapped.len(), 2);
    }

    #[test]
    fn test_map_values_needs_a_known_key() {
        let batch = &vitals().extraction_plan(None)[0];
        let err = batch.map_values(&json!({ "answer": "patient is fine" })).unwrap_err();
        assert!(err.contains("none of the requested fields"));

        assert!(batch.map_values(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_explicit_schema_answers_pass_through() {
        let mut field = FormField::new("custom", "string");
        field.schema = Some(json!({ "type": "string" }));
        let plan = FormSchema::from_fields("Custom", vec![field]).extraction_plan(None);
        let mapped = plan[0].map_values(&json!({ "q0": "free text" })).unwrap();
        assert_eq!(mapped["custom"], json!("free text"));
    }

    #[test]
    fn test_map_values_rejects_non_object() {
        let batch = &vitals().extraction_plan(None)[0];
        let err = batch.map_values(&json!(["q0"])).unwrap_err();
        assert!(err.contains("an array"));
    }
}
