use crate::{
    error::{RequestError, Result},
    schema::Schema,
};

/// Attribute names to project from read results.
///
/// ```rust
/// use dynamodb_mapper::common::selection::Selection;
///
/// let single = Selection::from("email");
/// let many = Selection::from(["email", "age"]);
/// assert_eq!(many.names(), ["email".to_string(), "age".to_string()]);
/// # assert_eq!(single.names().len(), 1);
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Selection(Vec<String>);

impl Selection {
    /// Selected attribute names, in insertion order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Check every name against the schema and hand back the names.
    pub(crate) fn validate(self, schema: &Schema) -> Result<Vec<String>> {
        if let Some(unknown) = self.0.iter().find(|name| schema.attribute(name).is_none()) {
            return Err(RequestError::UnknownAttribute(unknown.clone()).into());
        }
        Ok(self.0)
    }
}

impl From<&str> for Selection {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for Selection {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for Selection {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selection {
    fn from(names: [&str; N]) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}
