use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// 查询键的一段
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    Bool(bool),
    Map(BTreeMap<String, String>),
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        KeyPart::Str(v.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(v: String) -> Self {
        KeyPart::Str(v)
    }
}

impl From<&String> for KeyPart {
    fn from(v: &String) -> Self {
        KeyPart::Str(v.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        KeyPart::Int(v)
    }
}

impl From<u32> for KeyPart {
    fn from(v: u32) -> Self {
        KeyPart::Int(i64::from(v))
    }
}

impl From<bool> for KeyPart {
    fn from(v: bool) -> Self {
        KeyPart::Bool(v)
    }
}

impl From<BTreeMap<String, String>> for KeyPart {
    fn from(v: BTreeMap<String, String>) -> Self {
        KeyPart::Map(v)
    }
}

impl From<&BTreeMap<String, String>> for KeyPart {
    fn from(v: &BTreeMap<String, String>) -> Self {
        KeyPart::Map(v.clone())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{}", s),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Map(m) => {
                let pairs: Vec<String> = m.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", pairs.join("&"))
            }
        }
    }
}

/// 查询键：有序元组，按结构比较
///
/// 前缀匹配按整段比较，`["habits"]` 不会匹配 `["ongoing-habits"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(root: impl Into<KeyPart>) -> Self {
        QueryKey(vec![root.into()])
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
