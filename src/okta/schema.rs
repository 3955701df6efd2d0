//! Pre-flight check of input columns against the remote user profile schema.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use super::client::UserApi;
use crate::error::{ImportError, ImportResult};
use crate::schema::FieldSchema;

/// Declared type of a user profile attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Array,
    Number,
}

impl AttributeType {
    fn from_declared(kind: Option<&str>) -> Self {
        match kind {
            Some("string") => AttributeType::String,
            Some("array") => AttributeType::Array,
            _ => AttributeType::Number,
        }
    }
}

/// Body of the user schema endpoint. Only attribute names and types are read.
#[derive(Debug, Deserialize)]
pub struct SchemaDocument {
    definitions: Definitions,
}

#[derive(Debug, Deserialize)]
struct Definitions {
    #[serde(default)]
    base: Section,
    #[serde(default)]
    custom: Section,
}

#[derive(Debug, Default, Deserialize)]
struct Section {
    #[serde(default)]
    properties: HashMap<String, Property>,
}

#[derive(Debug, Deserialize)]
struct Property {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Attribute name to type, merged from base and custom definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSchema {
    attributes: HashMap<String, AttributeType>,
}

impl RemoteSchema {
    pub fn from_document(document: SchemaDocument) -> Self {
        let Definitions { base, custom } = document.definitions;
        let attributes = base
            .properties
            .into_iter()
            .chain(custom.properties)
            .map(|(name, property)| {
                let kind = AttributeType::from_declared(property.kind.as_deref());
                (name, kind)
            })
            .collect();
        Self { attributes }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes.get(name).copied()
    }

    /// Confirm every profile column exists remotely and classify each one.
    pub fn check<'a>(
        &self,
        schema: &'a FieldSchema,
    ) -> ImportResult<BTreeMap<&'a str, AttributeType>> {
        schema
            .profile_fields()
            .iter()
            .map(|name| {
                self.attribute_type(name)
                    .map(|kind| (name.as_str(), kind))
                    .ok_or_else(|| ImportError::UnknownAttribute(name.clone()))
            })
            .collect()
    }
}

/// Fetch the remote schema and verify the input columns against it.
pub async fn preflight<A: UserApi>(
    api: &A,
    schema: &FieldSchema,
) -> ImportResult<RemoteSchema> {
    log::info!("comparing {} input attributes to the user schema", schema.profile_fields().len());
    let remote = api.fetch_user_schema().await?;
    let types = remote.check(schema)?;
    log::debug!("attribute types: {:?}", types);
    log::info!(
        "all {} attributes exist in the user schema ({} defined remotely)",
        types.len(),
        remote.len()
    );
    Ok(remote)
}
