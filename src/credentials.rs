//! Credential block construction for new users.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{ImportError, ImportResult};
use crate::schema::{FieldSchema, PASSWORD_FIELD, Record, SALT_FIELD};

/// How passwords from the input are handed to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMode {
    /// Users are created without credentials.
    Empty,
    /// Password verification is delegated to the default inline hook.
    Hook,
    /// Cleartext password taken from the input.
    Plain,
    Bcrypt,
    Sha512,
    Sha256,
    Sha1,
    Md5,
}

impl PasswordMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PasswordMode::Empty => "EMPTY",
            PasswordMode::Hook => "HOOK",
            PasswordMode::Plain => "PLAIN",
            PasswordMode::Bcrypt => "BCRYPT",
            PasswordMode::Sha512 => "SHA-512",
            PasswordMode::Sha256 => "SHA-256",
            PasswordMode::Sha1 => "SHA-1",
            PasswordMode::Md5 => "MD5",
        }
    }
}

impl fmt::Display for PasswordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PasswordMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMPTY" => Ok(PasswordMode::Empty),
            "HOOK" => Ok(PasswordMode::Hook),
            "PLAIN" => Ok(PasswordMode::Plain),
            "BCRYPT" => Ok(PasswordMode::Bcrypt),
            "SHA-512" => Ok(PasswordMode::Sha512),
            "SHA-256" => Ok(PasswordMode::Sha256),
            "SHA-1" => Ok(PasswordMode::Sha1),
            "MD5" => Ok(PasswordMode::Md5),
            _ => Err(()),
        }
    }
}

/// Where the salt sits relative to the password for fixed digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaltOrder {
    Prefix,
    Postfix,
}

impl FromStr for SaltOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PREFIX" => Ok(SaltOrder::Prefix),
            "POSTFIX" => Ok(SaltOrder::Postfix),
            _ => Err(()),
        }
    }
}

/// Raw password settings as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSettings {
    pub mode: PasswordMode,
    pub work_factor: Option<u32>,
    pub salt_order: Option<SaltOrder>,
}

/// Password settings resolved against the input columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPolicy {
    Empty,
    Hook,
    Plain {
        password: usize,
    },
    Hashed {
        algorithm: &'static str,
        param: HashParam,
        password: usize,
        salt: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashParam {
    WorkFactor(u32),
    SaltOrder(SaltOrder),
}

impl CredentialPolicy {
    /// Resolve column positions and mode parameters before ingestion starts.
    pub fn resolve(settings: &PasswordSettings, schema: &FieldSchema) -> ImportResult<Self> {
        let mode = settings.mode;
        let column = |name: &'static str| {
            schema
                .index_of(name)
                .ok_or(ImportError::MissingCredentialColumn {
                    mode: mode.as_str(),
                    column: name,
                })
        };

        let policy = match mode {
            PasswordMode::Empty => CredentialPolicy::Empty,
            PasswordMode::Hook => CredentialPolicy::Hook,
            PasswordMode::Plain => CredentialPolicy::Plain {
                password: column(PASSWORD_FIELD)?,
            },
            PasswordMode::Bcrypt => {
                let work_factor = settings.work_factor.ok_or_else(|| {
                    ImportError::Config("OKTA_WORK_FACTOR is required for BCRYPT".into())
                })?;
                CredentialPolicy::Hashed {
                    algorithm: mode.as_str(),
                    param: HashParam::WorkFactor(work_factor),
                    password: column(PASSWORD_FIELD)?,
                    salt: column(SALT_FIELD)?,
                }
            }
            PasswordMode::Sha512
            | PasswordMode::Sha256
            | PasswordMode::Sha1
            | PasswordMode::Md5 => {
                let salt_order = settings.salt_order.ok_or_else(|| {
                    ImportError::Config(format!("OKTA_SALT_ORDER is required for {mode}"))
                })?;
                CredentialPolicy::Hashed {
                    algorithm: mode.as_str(),
                    param: HashParam::SaltOrder(salt_order),
                    password: column(PASSWORD_FIELD)?,
                    salt: column(SALT_FIELD)?,
                }
            }
        };

        Ok(policy)
    }

    /// Credential block for one record, or `None` when users get no password.
    pub fn credentials<'a>(&self, record: &'a Record) -> Option<Credentials<'a>> {
        let password = match *self {
            CredentialPolicy::Empty => return None,
            CredentialPolicy::Hook => PasswordCredential::Hook {
                hook: PasswordHook { kind: "default" },
            },
            CredentialPolicy::Plain { password } => PasswordCredential::Value {
                value: record.get(password),
            },
            CredentialPolicy::Hashed {
                algorithm,
                param,
                password,
                salt,
            } => {
                let (work_factor, salt_order) = match param {
                    HashParam::WorkFactor(factor) => (Some(factor), None),
                    HashParam::SaltOrder(order) => (None, Some(order)),
                };
                PasswordCredential::Hash {
                    hash: PasswordHash {
                        algorithm,
                        work_factor,
                        salt_order,
                        salt: record.get(salt),
                        value: record.get(password),
                    },
                }
            }
        };

        Some(Credentials { password })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials<'a> {
    pub password: PasswordCredential<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PasswordCredential<'a> {
    Hook { hook: PasswordHook },
    Value { value: &'a str },
    Hash { hash: PasswordHash<'a> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordHook {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordHash<'a> {
    pub algorithm: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt_order: Option<SaltOrder>,
    pub salt: &'a str,
    pub value: &'a str,
}
