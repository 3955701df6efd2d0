//! Field schema derived from the input header, and the records aligned to it.

use std::collections::HashSet;

use crate::error::{ImportError, ImportResult};

pub const LOGIN_FIELD: &str = "login";
pub const PASSWORD_FIELD: &str = "password";
pub const SALT_FIELD: &str = "salt";

/// Ordered column names of the input, resolved once at startup.
///
/// Every column before `password` is a profile attribute. The password
/// column and anything after it only feed the credential block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    columns: Vec<String>,
    profile_len: usize,
    login_index: usize,
}

impl FieldSchema {
    pub fn from_header<I, S>(header: I) -> ImportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = header.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(ImportError::MissingHeader);
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ImportError::DuplicateField(name.clone()));
            }
        }

        let profile_len = columns
            .iter()
            .position(|name| name == PASSWORD_FIELD)
            .unwrap_or(columns.len());
        let login_index = columns[..profile_len]
            .iter()
            .position(|name| name == LOGIN_FIELD)
            .ok_or(ImportError::MissingColumn(LOGIN_FIELD))?;

        Ok(Self {
            columns,
            profile_len,
            login_index,
        })
    }

    /// Number of values every record must carry.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Columns that map onto user profile attributes.
    pub fn profile_fields(&self) -> &[String] {
        &self.columns[..self.profile_len]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn login_index(&self) -> usize {
        self.login_index
    }
}

/// One input row. Values are positionally aligned to the [`FieldSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or_default()
    }

    pub fn login<'a>(&'a self, schema: &FieldSchema) -> &'a str {
        self.get(schema.login_index())
    }
}
