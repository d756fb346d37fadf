use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::{AlgorithmConfiguration, EncryptRuleConfiguration};
use crate::error::{Error, Result};
use crate::names::{eq_ignore_case, NameMap};
use crate::value::Value;

pub trait Encryptor: Send + Sync + fmt::Debug {
    fn encryptor_type(&self) -> &'static str;

    fn encrypt(&self, value: &Value) -> Result<Value>;
}

/// One-way SHA-256 digest, hex encoded, with an optional `salt` prefix.
#[derive(Debug, Clone, Default)]
pub struct Sha256Encryptor {
    salt: String,
}

impl Encryptor for Sha256Encryptor {
    fn encryptor_type(&self) -> &'static str {
        "SHA256"
    }

    fn encrypt(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(value.to_string().as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(Value::Text(hex))
    }
}

fn create_encryptor(name: &str, config: &AlgorithmConfiguration) -> Result<Arc<dyn Encryptor>> {
    match config.algorithm_type.to_ascii_uppercase().as_str() {
        "SHA256" => Ok(Arc::new(Sha256Encryptor {
            salt: config.props.get_str("salt").unwrap_or_default(),
        })),
        other => Err(Error::Encrypt {
            name: name.to_string(),
            reason: format!("unknown encryptor type {}", other),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct EncryptColumn {
    pub name: String,
    pub cipher_column: String,
    pub encryptor_name: String,
    pub encryptor: Arc<dyn Encryptor>,
}

impl EncryptColumn {
    pub fn encrypt(&self, value: &Value) -> Result<Value> {
        self.encryptor.encrypt(value).map_err(|e| match e {
            Error::Encrypt { .. } => e,
            other => Error::Encrypt {
                name: self.encryptor_name.clone(),
                reason: other.to_string(),
            },
        })
    }
}

/// Logical columns stored as cipher columns.
#[derive(Debug, Clone, Default)]
pub struct EncryptRule {
    tables: NameMap<Vec<EncryptColumn>>,
}

impl EncryptRule {
    pub fn build(config: &EncryptRuleConfiguration) -> Result<Self> {
        let mut encryptors = NameMap::new();
        for (name, algorithm) in &config.encryptors {
            encryptors.insert(name.clone(), create_encryptor(name, algorithm)?);
        }
        let mut tables = NameMap::new();
        for table in &config.tables {
            let mut columns = Vec::with_capacity(table.columns.len());
            for column in &table.columns {
                let encryptor = encryptors.get(&column.encryptor_name).cloned().ok_or_else(|| {
                    Error::Config(format!(
                        "encrypt column {}.{} references unknown encryptor {}",
                        table.table, column.name, column.encryptor_name
                    ))
                })?;
                columns.push(EncryptColumn {
                    name: column.name.clone(),
                    cipher_column: column.cipher_column.clone(),
                    encryptor_name: column.encryptor_name.clone(),
                    encryptor,
                });
            }
            tables.insert(table.table.clone(), columns);
        }
        Ok(Self { tables })
    }

    pub fn governs(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&EncryptColumn> {
        self.tables
            .get(table)?
            .iter()
            .find(|c| eq_ignore_case(&c.name, column))
    }
}
