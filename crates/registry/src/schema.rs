//! Declared input contracts for handlers.
//!
//! A [`ParamSchema`] is checked by the dispatcher before a handler runs and
//! rendered as JSON Schema for LLM tool manifests.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value, json},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            },
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    fn json_type(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Number => Some("number"),
            Self::Integer => Some("integer"),
            Self::Boolean => Some("boolean"),
            Self::Object => Some("object"),
            Self::Array => Some("array"),
            Self::Any => None,
        }
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamField {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

/// Object-shaped parameter contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSchema {
    fields: Vec<ParamField>,
    additional_properties: bool,
    open: bool,
}

impl Default for ParamSchema {
    fn default() -> Self {
        Self::any()
    }
}

impl ParamSchema {
    /// Accepts any value; no validation is performed.
    pub fn any() -> Self {
        Self {
            fields: Vec::new(),
            additional_properties: true,
            open: true,
        }
    }

    /// An object with no declared fields. Unknown fields are rejected until
    /// [`allow_additional`](Self::allow_additional) is called.
    pub fn object() -> Self {
        Self {
            fields: Vec::new(),
            additional_properties: false,
            open: false,
        }
    }

    pub fn required(self, name: impl Into<String>, ty: ParamType, description: &str) -> Self {
        self.field(name, ty, true, description)
    }

    pub fn optional(self, name: impl Into<String>, ty: ParamType, description: &str) -> Self {
        self.field(name, ty, false, description)
    }

    fn field(mut self, name: impl Into<String>, ty: ParamType, required: bool, description: &str) -> Self {
        self.open = false;
        self.fields.push(ParamField {
            name: name.into(),
            ty,
            required,
            description: (!description.is_empty()).then(|| description.to_string()),
        });
        self
    }

    pub fn allow_additional(mut self) -> Self {
        self.additional_properties = true;
        self
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    /// Check `params` against the contract. A JSON `null` counts as `{}`.
    /// Returns the first violation.
    pub fn validate(&self, params: &Value) -> Result<(), String> {
        if self.open {
            return Ok(());
        }
        let empty = Map::new();
        let obj = match params {
            Value::Null => &empty,
            Value::Object(obj) => obj,
            other => {
                return Err(format!(
                    "params must be an object, got {}",
                    describe_value(other)
                ));
            },
        };

        for field in &self.fields {
            match obj.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(format!("missing required parameter `{}`", field.name));
                    }
                },
                Some(value) => {
                    if !field.ty.matches(value) {
                        let expected = field.ty.json_type().unwrap_or("any");
                        return Err(format!(
                            "parameter `{}` must be {expected}, got {}",
                            field.name,
                            describe_value(value)
                        ));
                    }
                },
            }
        }

        if !self.additional_properties
            && let Some(unknown) = obj
                .keys()
                .find(|k| !self.fields.iter().any(|f| &f.name == *k))
        {
            return Err(format!("unknown parameter `{unknown}`"));
        }

        Ok(())
    }

    /// Render as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        if self.open {
            return json!({ "type": "object", "additionalProperties": true });
        }
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            if let Some(ty) = field.ty.json_type() {
                prop.insert("type".into(), json!(ty));
            }
            if let Some(desc) = &field.description {
                prop.insert("description".into(), json!(desc));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
        }
        let required: Vec<_> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": self.additional_properties,
        })
    }
}
