//! Schema definitions for providers, resources and data sources

use crate::defaults::AttributeDefault;
use crate::plan_modifier::PlanModifier;
use crate::types::Dynamic;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// cty type constraint in Terraform's JSON notation
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeType::String => serde_json::json!("string"),
            AttributeType::Number => serde_json::json!("number"),
            AttributeType::Bool => serde_json::json!("bool"),
            AttributeType::List(elem) => serde_json::json!(["list", elem.to_json()]),
            AttributeType::Map(elem) => serde_json::json!(["map", elem.to_json()]),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Whether `value` conforms to this type; null and unknown always do
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (value, self) {
            (Dynamic::Null | Dynamic::Unknown, _) => true,
            (Dynamic::String(_), AttributeType::String) => true,
            (Dynamic::Number(_), AttributeType::Number) => true,
            (Dynamic::Bool(_), AttributeType::Bool) => true,
            (Dynamic::List(list), AttributeType::List(elem)) => {
                list.iter().all(|item| elem.accepts(item))
            }
            (Dynamic::Map(map), AttributeType::Map(elem)) => {
                map.values().all(|item| elem.accepts(item))
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub default: Option<Arc<dyn AttributeDefault>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("has_default", &self.default.is_some())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .finish()
    }
}

pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, r#type: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                default: None,
                plan_modifiers: Vec::new(),
            },
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    /// Defaults only apply to optional+computed attributes, so this marks the
    /// attribute computed as well
    pub fn default(mut self, default: impl AttributeDefault + 'static) -> Self {
        self.attribute.default = Some(Arc::new(default));
        self.attribute.computed = true;
        self
    }

    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.attribute.plan_modifiers.push(Arc::new(modifier));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: i64,
    pub description: String,
    pub attributes: HashMap<String, Attribute>,
}

impl Schema {
    /// Attributes sorted by name, for stable wire output
    pub fn sorted_attributes(&self) -> Vec<&Attribute> {
        let mut attrs: Vec<&Attribute> = self.attributes.values().collect();
        attrs.sort_by(|a, b| a.name.cmp(&b.name));
        attrs
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: AttributeBuilder) -> Self {
        let attr = attr.build();
        self.schema.attributes.insert(attr.name.clone(), attr);
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}
