//! Component runner start requests and driver start arguments.

use crate::{
    handle::{ClientEnd, HandleInfo, ServerEnd},
    node::NodeSymbol,
};
use alloc::{boxed::Box, vec::Vec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryValue {
    Str(Box<str>),
    StrVec(Vec<Box<str>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub key: Box<str>,
    pub value: Option<DictionaryValue>,
}

/// The `program` section of a component manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    pub entries: Option<Vec<DictionaryEntry>>,
}

impl Dictionary {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Dictionary {
        Dictionary {
            entries: Some(
                pairs
                    .into_iter()
                    .map(|(key, value)| DictionaryEntry {
                        key: key.into(),
                        value: Some(DictionaryValue::Str(value.into())),
                    })
                    .collect(),
            ),
        }
    }
}

/// Look up a string value in a program dictionary.
pub fn program_value<'a>(program: Option<&'a Dictionary>, key: &str) -> Option<&'a str> {
    program?
        .entries
        .as_ref()?
        .iter()
        .find(|entry| entry.key.as_ref() == key)
        .and_then(|entry| match &entry.value {
            Some(DictionaryValue::Str(value)) => Some(value.as_ref()),
            _ => None,
        })
}

#[derive(Debug)]
pub struct NamespaceEntry {
    pub path: Option<Box<str>>,
    pub directory: Option<ClientEnd>,
}

/// What the component framework hands a runner when a component starts.
#[derive(Debug, Default)]
pub struct ComponentStartInfo {
    pub resolved_url: Option<Box<str>>,
    pub program: Option<Dictionary>,
    pub ns: Option<Vec<NamespaceEntry>>,
    pub outgoing_dir: Option<ServerEnd>,
    pub numbered_handles: Option<Vec<HandleInfo>>,
}

/// What a driver host receives when asked to start a driver.
#[derive(Debug, Default)]
pub struct DriverStartArgs {
    pub node: Option<ClientEnd>,
    pub url: Option<Box<str>>,
    pub program: Option<Dictionary>,
    pub ns: Option<Vec<NamespaceEntry>>,
    pub outgoing_dir: Option<ServerEnd>,
    pub symbols: Option<Vec<NodeSymbol>>,
}
