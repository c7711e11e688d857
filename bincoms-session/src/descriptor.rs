//! Function descriptors and the capability table

use bincoms_core::{ArgumentLayout, BincomsError, BincomsResult, FieldCode, ReturnLayout};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Id of the function answering how many functions the device exposes
pub const COMMAND_COUNT_ID: u8 = 0;

/// Id of the function answering name and layouts of another function
pub const COMMAND_NAMES_ID: u8 = 1;

/// Selector values understood by the command names function
pub const SELECT_NAME: u8 = 0;
pub const SELECT_ARGUMENTS: u8 = 1;
pub const SELECT_RETURN: u8 = 2;

/// One callable device function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub id: u8,
    pub name: String,
    pub argument_layout: ArgumentLayout,
    pub return_layout: ReturnLayout,
}

impl FunctionDescriptor {
    /// Build a descriptor from the layout strings the device reports
    pub fn parse(id: u8, name: &str, arguments: &str, returns: &str) -> BincomsResult<Self> {
        Ok(Self {
            id,
            name: name.to_string(),
            argument_layout: ArgumentLayout::parse(arguments)?,
            return_layout: ReturnLayout::parse(returns)?,
        })
    }

    /// Reserved function 0: no arguments, returns the function count
    pub fn command_count() -> Self {
        Self {
            id: COMMAND_COUNT_ID,
            name: String::new(),
            argument_layout: ArgumentLayout::Fields(Vec::new()),
            return_layout: ReturnLayout::Fields(vec![FieldCode::U8]),
        }
    }

    /// Reserved function 1: `(function id, selector)`, returns a string
    pub fn command_names() -> Self {
        Self {
            id: COMMAND_NAMES_ID,
            name: String::new(),
            argument_layout: ArgumentLayout::Fields(vec![FieldCode::U8, FieldCode::U8]),
            return_layout: ReturnLayout::Text,
        }
    }

    /// `name(arguments) -> returns`
    pub fn signature(&self) -> String {
        format!("{}({}) -> {}", self.name, self.argument_layout, self.return_layout)
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.signature())
    }
}

/// Functions advertised by a device, by name and by id
///
/// Immutable once the handshake completed; shared between sessions and
/// gates through an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    by_name: HashMap<String, Arc<FunctionDescriptor>>,
    ordered: Vec<Arc<FunctionDescriptor>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor; function names must be unique
    pub fn insert(&mut self, descriptor: FunctionDescriptor) -> BincomsResult<()> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(BincomsError::DuplicateFunction(descriptor.name));
        }
        let descriptor = Arc::new(descriptor);
        self.by_name
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));
        self.ordered.push(descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FunctionDescriptor>> {
        self.by_name.get(name)
    }

    /// Look a function up, failing with `UnknownOperation`
    pub fn lookup(&self, name: &str) -> BincomsResult<Arc<FunctionDescriptor>> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| BincomsError::UnknownOperation(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Descriptors in the order the device numbered them
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FunctionDescriptor>> {
        self.ordered.iter()
    }

    /// Function names in id order
    pub fn names(&self) -> Vec<String> {
        self.ordered.iter().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl PartialEq for CapabilityTable {
    fn eq(&self, other: &Self) -> bool {
        self.ordered == other.ordered
    }
}

impl Eq for CapabilityTable {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        let start = FunctionDescriptor::parse(2, "start", "f", "H").unwrap();
        assert_eq!(start.signature(), "start(f) -> H");
        let enable = FunctionDescriptor::parse(3, "enable_line", "Bc", "").unwrap();
        assert_eq!(enable.signature(), "enable_line(Bc) -> ");
    }

    #[test]
    fn test_unknown_layout_code() {
        assert!(matches!(
            FunctionDescriptor::parse(2, "bad", "x", ""),
            Err(BincomsError::UnknownFieldCode('x'))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut table = CapabilityTable::new();
        table
            .insert(FunctionDescriptor::parse(2, "start", "f", "H").unwrap())
            .unwrap();
        match table.insert(FunctionDescriptor::parse(3, "start", "", "").unwrap()) {
            Err(BincomsError::DuplicateFunction(name)) => assert_eq!(name, "start"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup() {
        let mut table = CapabilityTable::new();
        table
            .insert(FunctionDescriptor::parse(2, "start", "f", "H").unwrap())
            .unwrap();
        table
            .insert(FunctionDescriptor::parse(3, "enable_line", "Bc", "").unwrap())
            .unwrap();

        assert_eq!(table.lookup("enable_line").unwrap().id, 3);
        assert!(matches!(
            table.lookup("stop"),
            Err(BincomsError::UnknownOperation(_))
        ));
        assert_eq!(table.names(), vec!["start", "enable_line"]);
    }
}
