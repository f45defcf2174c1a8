use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use stepwise_core::error::{Result, StepwiseError};

/// Positional and named arguments bound to a queued call.
///
/// Keyword names are unique: inserting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Insert a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Append a positional argument from any serializable value.
    pub fn try_arg<S: Serialize + ?Sized>(self, value: &S) -> Result<Self> {
        Ok(self.arg(serde_json::to_value(value)?))
    }

    /// Insert a keyword argument from any serializable value.
    pub fn try_kwarg<S: Serialize + ?Sized>(self, key: impl Into<String>, value: &S) -> Result<Self> {
        Ok(self.kwarg(key, serde_json::to_value(value)?))
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn get_kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg_as<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self
            .get(index)
            .ok_or_else(|| StepwiseError::MissingArgument(format!("#{index}")))?;
        Ok(T::deserialize(value)?)
    }

    /// Deserialize the keyword argument named `key`.
    pub fn kwarg_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .get_kwarg(key)
            .ok_or_else(|| StepwiseError::MissingArgument(key.to_string()))?;
        Ok(T::deserialize(value)?)
    }

    /// Total number of positional and keyword arguments.
    pub fn len(&self) -> usize {
        self.args.len() + self.kwargs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}
