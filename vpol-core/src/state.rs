use rustc_hash::FxHashMap;

use crate::error::RuntimeError;

/// Flat global variable store: unique names, string values, alive for the
/// whole run. Writes always succeed and overwrite silently.
#[derive(Debug, Default)]
pub struct Variables {
    map: FxHashMap<String, String>,
}

impl Variables {
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Reading an undefined name is a fatal script error.
    pub fn get(&self, name: &str) -> Result<&str, RuntimeError> {
        self.lookup(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    pub fn set(&mut self, name: &str, value: String) {
        self.map.insert(name.to_string(), value);
    }
}

/// Named statement blocks captured by the preprocessor.
///
/// Bodies are the raw trimmed lines between `${name` and `}`, replayed
/// through the dispatcher when the function is called.
#[derive(Debug, Default)]
pub struct Functions {
    map: FxHashMap<String, Vec<String>>,
}

impl Functions {
    /// Lenient mode overwrites an existing body (last definition wins);
    /// strict mode rejects the redefinition.
    pub fn define(
        &mut self,
        name: String,
        body: Vec<String>,
        strict: bool,
    ) -> Result<(), RuntimeError> {
        if strict && self.map.contains_key(&name) {
            return Err(RuntimeError::FunctionRedefined(name));
        }
        self.map.insert(name, body);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&[String], RuntimeError> {
        self.map
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.to_string()))
    }
}
