use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    grad::{Function, Tensor, Variable},
};

/// Trainable tensors of a model, addressed by unique names.
/// Iteration follows insertion order.
#[derive(Clone, Debug, Default)]
pub struct ParamSet {
    entries: Vec<(String, Variable)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `parameter` under `name`. Names must be unique within the set.
    pub fn insert(&mut self, name: impl Into<String>, parameter: Variable) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(Error::DuplicateParameter(name));
        }
        self.entries.push((name, parameter));
        Ok(())
    }

    /// Builder form of `insert`.
    pub fn with(mut self, name: impl Into<String>, parameter: Variable) -> Result<Self> {
        self.insert(name, parameter)?;
        Ok(self)
    }

    /// Union of two sets, `self` first. Fails if a name appears in both.
    pub fn chain(&self, other: &ParamSet) -> Result<ParamSet> {
        let mut chained = self.clone();
        for (name, parameter) in other.iter() {
            chained.insert(name, parameter.clone())?;
        }
        Ok(chained)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, parameter)| parameter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.entries
            .iter()
            .map(|(name, parameter)| (name.as_str(), parameter))
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|(name, _)| name).collect()
    }

    /// Parameters in insertion order.
    pub fn values(&self) -> Vec<&Variable> {
        self.iter().map(|(_, parameter)| parameter).collect()
    }

    pub fn zero_gradients(&self) {
        for parameter in self.values() {
            parameter.zero_gradient();
        }
    }
}

/// Gradient of a cost with respect to each parameter, keyed by parameter name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gradients {
    by_name: HashMap<String, Tensor>,
}

impl Gradients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the gradients currently held by every parameter of `params`.
    pub fn from_params(params: &ParamSet) -> Self {
        params
            .iter()
            .map(|(name, parameter)| (name.to_string(), parameter.gradient().clone()))
            .collect()
    }

    /// Set the gradient for `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, gradient: Tensor) {
        self.by_name.insert(name.into(), gradient);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Tensor)> for Gradients {
    fn from_iter<T: IntoIterator<Item = (String, Tensor)>>(iter: T) -> Self {
        Self {
            by_name: iter.into_iter().collect(),
        }
    }
}
