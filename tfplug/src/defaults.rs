//! Default value providers for attributes
//!
//! Defaults are evaluated during planning for optional+computed attributes
//! whose configuration value is null.
//!
//! ```no_run
//! use tfplug::defaults::StaticDefault;
//! use tfplug::schema::AttributeBuilder;
//!
//! let location = AttributeBuilder::string("location")
//!     .optional()
//!     .default(StaticDefault::string("us"))
//!     .build();
//! ```

use crate::types::Dynamic;

#[derive(Debug, Clone)]
pub struct DefaultRequest {
    pub attribute_path: String,
}

#[derive(Debug, Clone)]
pub struct DefaultResponse {
    pub value: Dynamic,
}

pub trait AttributeDefault: Send + Sync {
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    /// Create a static string default
    pub fn string(value: &str) -> Self {
        Self::new(Dynamic::String(value.to_string()))
    }
}

impl AttributeDefault for StaticDefault {
    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: self.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_default_returns_value() {
        let default = StaticDefault::string("us");
        let response = default.default_value(DefaultRequest {
            attribute_path: "location".to_string(),
        });

        assert_eq!(response.value, Dynamic::String("us".to_string()));
    }

    #[test]
    fn static_default_ignores_attribute_path() {
        let default = StaticDefault::new(Dynamic::Null);
        for path in ["location", "nested.location"] {
            let response = default.default_value(DefaultRequest {
                attribute_path: path.to_string(),
            });
            assert!(response.value.is_null());
        }
    }
}
