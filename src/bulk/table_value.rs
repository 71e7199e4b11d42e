//! Table-valued parameter binding
//!
//! Large value sets can be bound as one array parameter of a store-side
//! collection type instead of being expanded into chunked `IN` lists.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Store collection type for text values
pub const TEXT_LIST_TYPE: &str = "SYS.ODCIVARCHAR2LIST";

/// Store collection type for integer values
pub const NUMBER_LIST_TYPE: &str = "SYS.ODCINUMBERLIST";

/// Converts an element before binding
pub type ElementConverter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

type Matcher = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A value set bound as a single array parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayBinding {
    /// Store-side collection type
    pub type_name: String,
    /// Element type descriptor, when the collection type needs one
    pub descriptor: Option<String>,
    pub values: Vec<Value>,
}

impl ArrayBinding {
    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }
}

enum RuleMatch {
    /// Exact value kind, see [`Value::type_name`]
    Kind(&'static str),
    /// Any value accepted by the predicate
    Predicate(Matcher),
}

/// Registered mapping from a value kind to a store collection type
#[derive(Clone)]
pub struct TableTypeRule {
    matcher: Arc<RuleMatch>,
    type_name: String,
    descriptor: Option<String>,
    convert: Option<ElementConverter>,
}

impl TableTypeRule {
    /// Rule for values whose kind is exactly `kind` (e.g. `"Entity"`)
    pub fn for_kind(kind: &'static str, type_name: impl Into<String>) -> Self {
        Self::with_matcher(RuleMatch::Kind(kind), type_name)
    }

    /// Rule for any value accepted by `matches`
    pub fn matching<F>(matches: F, type_name: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::with_matcher(RuleMatch::Predicate(Arc::new(matches)), type_name)
    }

    fn with_matcher(matcher: RuleMatch, type_name: impl Into<String>) -> Self {
        Self {
            matcher: Arc::new(matcher),
            type_name: type_name.into(),
            descriptor: None,
            convert: None,
        }
    }

    pub fn descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    pub fn convert<F>(mut self, convert: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.convert = Some(Arc::new(convert));
        self
    }

    fn bind(&self, values: &[Value]) -> ArrayBinding {
        let values = match &self.convert {
            Some(convert) => values.iter().cloned().map(|v| convert(v)).collect(),
            None => values.to_vec(),
        };
        ArrayBinding {
            type_name: self.type_name.clone(),
            descriptor: self.descriptor.clone(),
            values,
        }
    }
}

impl fmt::Debug for TableTypeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matcher = match self.matcher.as_ref() {
            RuleMatch::Kind(kind) => kind.to_string(),
            RuleMatch::Predicate(_) => "<predicate>".to_string(),
        };
        f.debug_struct("TableTypeRule")
            .field("matcher", &matcher)
            .field("type_name", &self.type_name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Bulk value-set strategy.
///
/// Availability of the store-side array types is decided once at startup
/// and passed in; nothing is probed per call.
#[derive(Debug, Clone, Default)]
pub struct TableValueSupport {
    enabled: bool,
    available: bool,
    rules: Vec<TableTypeRule>,
}

impl TableValueSupport {
    pub fn new(enabled: bool, available: bool) -> Self {
        Self {
            enabled,
            available,
            rules: Vec::new(),
        }
    }

    /// Strategy that never binds arrays
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn register(mut self, rule: TableTypeRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.available
    }

    /// True when `values` would be bound as an array
    pub fn is_supported(&self, values: &[Value]) -> bool {
        self.is_enabled() && values.first().is_some_and(|head| self.rule_for(head).is_some())
    }

    /// Binding for `values`, chosen from the kind of the first value.
    ///
    /// Returns `None` when disabled, unavailable, `values` is empty, or no
    /// rule applies.
    pub fn bind(&self, values: &[Value]) -> Option<ArrayBinding> {
        if !self.is_enabled() {
            return None;
        }
        let head = values.first()?;
        match self.rule_for(head)? {
            Rule::Registered(rule) => Some(rule.bind(values)),
            Rule::BuiltIn(type_name) => Some(ArrayBinding {
                type_name: type_name.to_string(),
                descriptor: None,
                values: values.to_vec(),
            }),
        }
    }

    /// First registered rule accepting `head`, then the built-in types
    fn rule_for(&self, head: &Value) -> Option<Rule<'_>> {
        let kind = head.type_name();
        let registered = self.rules.iter().find(|r| match r.matcher.as_ref() {
            RuleMatch::Kind(k) => *k == kind,
            RuleMatch::Predicate(p) => p(head),
        });
        if let Some(rule) = registered {
            return Some(Rule::Registered(rule));
        }
        match head {
            Value::Text(_) => Some(Rule::BuiltIn(TEXT_LIST_TYPE)),
            Value::Int(_) => Some(Rule::BuiltIn(NUMBER_LIST_TYPE)),
            _ => None,
        }
    }
}

enum Rule<'a> {
    Registered(&'a TableTypeRule),
    BuiltIn(&'static str),
}
