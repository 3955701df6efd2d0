//! Transforms input records into create-user request bodies.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::credentials::{CredentialPolicy, Credentials};
use crate::schema::{FieldSchema, Record};

/// Request body for one create-user call. Borrows from the record it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload<'a> {
    pub profile: BTreeMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials<'a>>,
    #[serde(rename = "groupIds")]
    pub group_ids: [&'a str; 1],
}

pub fn build_payload<'a>(
    record: &'a Record,
    schema: &'a FieldSchema,
    policy: &CredentialPolicy,
    group_id: &'a str,
) -> Payload<'a> {
    let profile = schema
        .profile_fields()
        .iter()
        .enumerate()
        .map(|(index, name)| (name.as_str(), record.get(index)))
        .collect();

    Payload {
        profile,
        credentials: policy.credentials(record),
        group_ids: [group_id],
    }
}

/// Immutable bundle of everything payload construction needs for a run.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    schema: FieldSchema,
    policy: CredentialPolicy,
    group_id: String,
}

impl PayloadBuilder {
    pub fn new(schema: FieldSchema, policy: CredentialPolicy, group_id: impl Into<String>) -> Self {
        Self {
            schema,
            policy,
            group_id: group_id.into(),
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn build<'a>(&'a self, record: &'a Record) -> Payload<'a> {
        build_payload(record, &self.schema, &self.policy, &self.group_id)
    }
}
