//! Protocol buffer types for Terraform Plugin Protocol v6
//!
//! The code is generated at build time by `tonic_build` from
//! `proto/tfplugin6.proto`. Several generated types share names with framework
//! types (`DynamicValue`, `Diagnostic`, `Schema`), so refer to them through the
//! `proto::` prefix.
//!
//! RPC request/response pairs live in snake_case modules, e.g.
//! `proto::read_resource::Request`.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderRpc, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_types_accessible() {
        let _ = diagnostic::Severity::Error;
        let _ = attribute_path::step::Selector::AttributeName("project".to_string());
        let _ = import_resource_state::ImportedResource::default();
    }

    #[test]
    fn stop_provider_error_field_is_snake_case() {
        let response = stop_provider::Response {
            error: String::new(),
        };
        assert!(response.error.is_empty());
    }
}
