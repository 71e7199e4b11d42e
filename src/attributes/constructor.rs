//! Projection targets
//!
//! A [`Constructor`] is an ordered list of parameters plus a function turning
//! the reconstructed argument tuple into the target type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::field::Field;
use crate::errors::{QueryError, QueryResult};
use crate::value::{FromValue, ObjectValue, Value};

/// Shape the constructor expects for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    Single,
    /// Row order, de-duplicated by position
    List,
    /// De-duplicated, first-seen order
    Set,
    /// De-duplicated, natural order
    SortedSet,
}

impl ParamShape {
    pub fn is_collection(&self) -> bool {
        !matches!(self, ParamShape::Single)
    }
}

/// Declared constructor parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub field: Field,
    pub shape: ParamShape,
}

impl Param {
    pub fn new(field: Field, shape: ParamShape) -> Self {
        Self { field, shape }
    }

    /// Declared type as shown in errors
    pub fn declared_type(&self) -> String {
        match self.shape {
            ParamShape::Single => self.field.declared_type(),
            ParamShape::List => format!("List<{}>", self.element_type()),
            ParamShape::Set => format!("Set<{}>", self.element_type()),
            ParamShape::SortedSet => format!("SortedSet<{}>", self.element_type()),
        }
    }

    fn element_type(&self) -> String {
        let declared = self.field.declared_type();
        declared
            .strip_prefix("Collection<")
            .and_then(|s| s.strip_suffix('>'))
            .map(str::to_string)
            .unwrap_or(declared)
    }
}

type BuildFn<R> = Arc<dyn Fn(&mut Args) -> QueryResult<R> + Send + Sync>;

/// Typed projection target
pub struct Constructor<R> {
    name: Arc<str>,
    params: Arc<[Param]>,
    build: BuildFn<R>,
}

impl<R> Clone for Constructor<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            build: self.build.clone(),
        }
    }
}

impl<R> fmt::Debug for Constructor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl<R> Constructor<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Applies the constructor function to a fully reconstructed tuple
    pub fn apply(&self, values: Vec<Value>) -> QueryResult<R> {
        if values.len() != self.params.len() {
            return Err(QueryError::ArityMismatch {
                target: self.name.to_string(),
                expected: self.params.len(),
                actual: values.len(),
            });
        }
        let mut args = Args::new(self.name.clone(), values);
        (self.build)(&mut args)
    }
}

impl Constructor<Value> {
    /// Single-field projection yielding the reconstructed value as is
    pub fn value(field: Field) -> Self {
        let name = format!("Value({})", field);
        ConstructorBuilder::new(name).param(field).build(|args| args.next())
    }
}

impl Constructor<Vec<Value>> {
    /// Tuple projection yielding the reconstructed values in order
    pub fn tuple(fields: Vec<Field>) -> Self {
        let name = format!("Tuple{}", fields.len());
        let mut builder = ConstructorBuilder::new(name);
        for field in fields {
            builder = builder.param(field);
        }
        builder.build(|args| {
            let mut out = Vec::with_capacity(args.remaining());
            while args.remaining() > 0 {
                out.push(args.next()?);
            }
            Ok(out)
        })
    }
}

/// Collects parameters for a [`Constructor`]
#[derive(Debug)]
pub struct ConstructorBuilder {
    name: String,
    params: Vec<Param>,
}

impl ConstructorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter; collection fields default to a list for list
    /// attributes and to a set otherwise
    pub fn param(self, field: Field) -> Self {
        let shape = if !field.is_collection() {
            ParamShape::Single
        } else if field.is_list() {
            ParamShape::List
        } else {
            ParamShape::Set
        };
        self.with(Param::new(field, shape))
    }

    pub fn list(self, field: Field) -> Self {
        self.with(Param::new(field, ParamShape::List))
    }

    pub fn set(self, field: Field) -> Self {
        self.with(Param::new(field, ParamShape::Set))
    }

    pub fn sorted_set(self, field: Field) -> Self {
        self.with(Param::new(field, ParamShape::SortedSet))
    }

    pub fn with(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn build<R, F>(self, build: F) -> Constructor<R>
    where
        F: Fn(&mut Args) -> QueryResult<R> + Send + Sync + 'static,
    {
        Constructor {
            name: Arc::from(self.name),
            params: Arc::from(self.params),
            build: Arc::new(build),
        }
    }
}

/// Reconstructed arguments handed to a constructor function
#[derive(Debug)]
pub struct Args {
    target: Arc<str>,
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Args {
    fn new(target: Arc<str>, values: Vec<Value>) -> Self {
        Self {
            target,
            values: values.into_iter(),
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn take(&mut self) -> QueryResult<(usize, Value)> {
        let position = self.position;
        let value = self.values.next().ok_or_else(|| QueryError::ArityMismatch {
            target: self.target.to_string(),
            expected: position + 1,
            actual: position,
        })?;
        self.position += 1;
        Ok((position, value))
    }

    fn mismatch(&self, position: usize, expected: String, found: &Value) -> QueryError {
        QueryError::ArgumentTypeMismatch {
            target: self.target.to_string(),
            position,
            expected,
            found: found.type_name().to_string(),
        }
    }

    /// Next argument converted to `T`
    pub fn next<T: FromValue>(&mut self) -> QueryResult<T> {
        let (position, value) = self.take()?;
        T::from_value(value).map_err(|found| self.mismatch(position, T::expected(), &found))
    }

    /// Next argument as an object built by a nested constructor
    pub fn object<T: Any + Clone>(&mut self) -> QueryResult<T> {
        let (position, value) = self.take()?;
        self.downcast(position, value)
    }

    /// Next argument as an optional nested object
    pub fn optional_object<T: Any + Clone>(&mut self) -> QueryResult<Option<T>> {
        let (position, value) = self.take()?;
        match value {
            Value::Optional(None) => Ok(None),
            Value::Optional(Some(inner)) => self.downcast(position, *inner).map(Some),
            other => Err(self.mismatch(position, Self::type_label::<T>("Option"), &other)),
        }
    }

    /// Next argument as a collection of nested objects, in collection order
    pub fn objects<T: Any + Clone>(&mut self) -> QueryResult<Vec<T>> {
        let (position, value) = self.take()?;
        let items: Vec<Value> = match value {
            Value::List(items) | Value::Set(items) => items,
            Value::SortedSet(items) => items.into_iter().collect(),
            other => return Err(self.mismatch(position, Self::type_label::<T>("Vec"), &other)),
        };
        items
            .into_iter()
            .map(|item| self.downcast(position, item))
            .collect()
    }

    fn downcast<T: Any + Clone>(&self, position: usize, value: Value) -> QueryResult<T> {
        match &value {
            Value::Object(object) => {
                if let Some(t) = object.downcast_ref::<T>() {
                    return Ok(t.clone());
                }
            }
            _ => {}
        }
        Err(self.mismatch(position, std::any::type_name::<T>().to_string(), &value))
    }

    fn type_label<T>(outer: &str) -> String {
        format!("{}<{}>", outer, std::any::type_name::<T>())
    }
}

/// Type-erased constructor usable as the target of a relation
pub trait NestedProjection: Send + Sync {
    fn name(&self) -> &str;

    fn params(&self) -> &[Param];

    /// Builds the nested object and wraps it as a value
    fn assemble(&self, values: Vec<Value>) -> QueryResult<Value>;
}

impl<R> NestedProjection for Constructor<R>
where
    R: Any + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &[Param] {
        &self.params
    }

    fn assemble(&self, values: Vec<Value>) -> QueryResult<Value> {
        let object = self.apply(values.clone())?;
        Ok(Value::Object(ObjectValue::new(&self.name, values, object)))
    }
}
