//! Field descriptors
//!
//! A [`Field`] describes how to read one logical value off a record. The
//! variants are closed; every consumer matches them exhaustively.

use std::fmt;
use std::sync::Arc;

use super::constructor::NestedProjection;
use crate::errors::{QueryError, QueryResult};
use crate::metamodel::{Attribute, Metamodel};
use crate::value::Value;

/// Substitutes the real value of a pseudo field for its placeholder
pub type Substitute = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Typed handle to a field of a record type
#[derive(Clone)]
pub enum Field {
    /// Direct attribute, required-ness from storage
    Plain(Attribute),
    /// Attribute that storage allows to be null; reconstructs to an optional
    Optional(Attribute),
    /// Association followed by a nested constructor
    Relation(RelationField),
    /// Chain of association traversals
    Joined(JoinedField),
    /// Computed field with no storage backing
    Pseudo(PseudoField),
    /// The whole record
    SelfRef,
}

/// Association plus the nested projection applied to its target
#[derive(Clone)]
pub struct RelationField {
    pub association: Attribute,
    pub target: Arc<dyn NestedProjection>,
    /// Declared `Option<R>`: the association may be null
    pub optional: bool,
}

/// Multi-hop path; every step but the last is an association
#[derive(Clone)]
pub struct JoinedField {
    steps: Arc<[Field]>,
}

impl JoinedField {
    pub fn steps(&self) -> &[Field] {
        &self.steps
    }

    /// Associations traversed before the final step
    pub fn hops(&self) -> &[Field] {
        &self.steps[..self.steps.len() - 1]
    }

    pub fn last(&self) -> &Field {
        &self.steps[self.steps.len() - 1]
    }
}

/// Placeholder selected in the plan, replaced after the fetch
#[derive(Clone)]
pub struct PseudoField {
    pub name: String,
    pub placeholder: Value,
    pub substitute: Substitute,
}

impl Field {
    /// Plain descriptor; fails if storage allows null
    pub fn plain(attribute: Attribute) -> QueryResult<Self> {
        let field = Field::Plain(attribute);
        field.check_consistency()?;
        Ok(field)
    }

    /// Optional descriptor; fails if storage requires the field
    pub fn optional(attribute: Attribute) -> QueryResult<Self> {
        let field = Field::Optional(attribute);
        field.check_consistency()?;
        Ok(field)
    }

    /// Follows a required association into a nested projection
    pub fn relation<P>(association: Attribute, target: P) -> QueryResult<Self>
    where
        P: NestedProjection + 'static,
    {
        Self::make_relation(association, Arc::new(target), false)
    }

    /// Follows a nullable singular association into a nested projection
    pub fn optional_relation<P>(association: Attribute, target: P) -> QueryResult<Self>
    where
        P: NestedProjection + 'static,
    {
        Self::make_relation(association, Arc::new(target), true)
    }

    fn make_relation(
        association: Attribute,
        target: Arc<dyn NestedProjection>,
        optional: bool,
    ) -> QueryResult<Self> {
        if !association.is_association() {
            return Err(QueryError::IllegalDescriptorComposition(format!(
                "{} is not an association",
                association
            )));
        }
        let field = Field::Relation(RelationField {
            association,
            target,
            optional,
        });
        field.check_consistency()?;
        Ok(field)
    }

    /// Path through one or more associations; nested paths are flattened
    pub fn joined(steps: Vec<Field>) -> QueryResult<Self> {
        let mut flat = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                Field::Joined(j) => flat.extend(j.steps.iter().cloned()),
                other => flat.push(other),
            }
        }
        let Some((last, hops)) = flat.split_last() else {
            return Err(QueryError::IllegalDescriptorComposition(
                "joined path needs at least one step".into(),
            ));
        };

        let mut owner: Option<&str> = None;
        for hop in hops {
            let attr = match hop {
                Field::Plain(a) | Field::Optional(a) if a.is_association() => a,
                Field::Plain(a) | Field::Optional(a) => {
                    return Err(QueryError::IllegalDescriptorComposition(format!(
                        "{} is not an association and cannot be joined through",
                        a
                    )))
                }
                other => {
                    return Err(QueryError::IllegalDescriptorComposition(format!(
                        "{} cannot appear inside a joined path",
                        other
                    )))
                }
            };
            Self::check_link(owner, attr)?;
            owner = attr.target_entity();
        }
        match last {
            Field::SelfRef | Field::Joined(_) => {
                return Err(QueryError::IllegalDescriptorComposition(format!(
                    "{} cannot end a joined path",
                    last
                )))
            }
            Field::Pseudo(_) => {}
            other => {
                if let Some(attr) = other.attribute() {
                    Self::check_link(owner, attr)?;
                }
            }
        }

        let field = Field::Joined(JoinedField {
            steps: Arc::from(flat),
        });
        field.check_consistency()?;
        Ok(field)
    }

    fn check_link(owner: Option<&str>, attr: &Attribute) -> QueryResult<()> {
        match owner {
            Some(owner) if owner != attr.declaring_type => {
                Err(QueryError::IllegalDescriptorComposition(format!(
                    "{} is not declared by {}",
                    attr, owner
                )))
            }
            _ => Ok(()),
        }
    }

    /// Composes `self` followed by `next` into a joined path
    pub fn join(self, next: Field) -> QueryResult<Self> {
        Self::joined(vec![self, next])
    }

    /// Computed field selected as `placeholder` and replaced by `substitute`
    pub fn pseudo<F>(name: impl Into<String>, placeholder: Value, substitute: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Field::Pseudo(PseudoField {
            name: name.into(),
            placeholder,
            substitute: Arc::new(substitute),
        })
    }

    /// Pseudo field that always yields `value`
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        Self::pseudo(name, Value::Null, move |_| value.clone())
    }

    pub fn self_ref() -> Self {
        Field::SelfRef
    }

    /// Required unless a collection, optional, or a pseudo/self marker
    pub fn is_required(&self) -> bool {
        match self {
            Field::Plain(a) => !a.is_collection(),
            Field::Optional(_) => false,
            Field::Relation(r) => !r.optional && !r.association.is_collection(),
            Field::Joined(j) => {
                !self.is_collection()
                    && j.hops().iter().all(|s| matches!(s, Field::Plain(_)))
                    && j.last().is_required()
            }
            Field::Pseudo(_) | Field::SelfRef => false,
        }
    }

    /// Required as far as storage metadata is concerned
    pub fn is_required_by_storage(&self) -> bool {
        match self {
            Field::Plain(a) | Field::Optional(a) => a.is_required(),
            Field::Relation(r) => r.association.is_required(),
            Field::Joined(j) => j.steps.iter().all(Field::is_required_by_storage),
            Field::Pseudo(_) | Field::SelfRef => false,
        }
    }

    pub fn is_collection(&self) -> bool {
        match self {
            Field::Plain(a) | Field::Optional(a) => a.is_collection(),
            Field::Relation(r) => r.association.is_collection(),
            Field::Joined(j) => j.steps.iter().any(Field::is_collection),
            Field::Pseudo(_) | Field::SelfRef => false,
        }
    }

    /// True when the last plural step is a list
    pub fn is_list(&self) -> bool {
        match self {
            Field::Plain(a) | Field::Optional(a) => a.is_list(),
            Field::Relation(r) => r.association.is_list(),
            Field::Joined(j) => j
                .steps
                .iter()
                .rev()
                .find(|s| s.is_collection())
                .is_some_and(Field::is_list),
            Field::Pseudo(_) | Field::SelfRef => false,
        }
    }

    /// Pseudo and self descriptors bypass optional handling entirely
    pub fn is_marker(&self) -> bool {
        matches!(self, Field::Pseudo(_) | Field::SelfRef)
    }

    /// Checks that storage required-ness and the optional wrapper agree
    pub fn check_consistency(&self) -> QueryResult<()> {
        match self {
            Field::Plain(a) => {
                if a.is_required() {
                    Ok(())
                } else {
                    Err(QueryError::OptionalAttributeNeedsWrapping {
                        declaring: a.declaring_type.clone(),
                        attribute: a.name.clone(),
                    })
                }
            }
            Field::Optional(a) => {
                if a.is_required() {
                    Err(QueryError::RequiredAttributeMustNotBeWrapped {
                        declaring: a.declaring_type.clone(),
                        attribute: a.name.clone(),
                    })
                } else {
                    Ok(())
                }
            }
            Field::Relation(r) => {
                let a = &r.association;
                match (a.is_required(), r.optional) {
                    (false, false) => Err(QueryError::OptionalAttributeNeedsWrapping {
                        declaring: a.declaring_type.clone(),
                        attribute: a.name.clone(),
                    }),
                    (true, true) => Err(QueryError::RequiredAttributeMustNotBeWrapped {
                        declaring: a.declaring_type.clone(),
                        attribute: a.name.clone(),
                    }),
                    _ => Ok(()),
                }
            }
            Field::Joined(j) => j.steps.iter().try_for_each(Field::check_consistency),
            Field::Pseudo(_) | Field::SelfRef => Ok(()),
        }
    }

    /// Attribute read by this descriptor (final step for joined paths)
    pub fn attribute(&self) -> Option<&Attribute> {
        match self {
            Field::Plain(a) | Field::Optional(a) => Some(a),
            Field::Relation(r) => Some(&r.association),
            Field::Joined(j) => j.last().attribute(),
            Field::Pseudo(_) | Field::SelfRef => None,
        }
    }

    /// Nested projection of a relation
    pub fn nested(&self) -> Option<&Arc<dyn NestedProjection>> {
        match self {
            Field::Relation(r) => Some(&r.target),
            _ => None,
        }
    }

    /// Steps of a joined path
    pub fn steps(&self) -> Option<&[Field]> {
        match self {
            Field::Joined(j) => Some(j.steps()),
            _ => None,
        }
    }

    /// Embeddable type this descriptor denotes, if any.
    ///
    /// A relation whose nested target has a single embedded parameter
    /// counts as embedded too.
    pub fn embeddable_type(&self) -> Option<&str> {
        match self {
            Field::Plain(a) | Field::Optional(a) if a.is_embedded() => a.embeddable(),
            Field::Plain(_) | Field::Optional(_) => None,
            Field::Relation(r) => match r.target.params() {
                [only] => only.field.embeddable_type(),
                _ => None,
            },
            Field::Joined(j) => j.last().embeddable_type(),
            Field::Pseudo(_) | Field::SelfRef => None,
        }
    }

    /// True when the descriptor denotes an embeddable registered in `metamodel`
    pub fn is_embedded(&self, metamodel: &Metamodel) -> bool {
        self.embeddable_type()
            .is_some_and(|e| metamodel.embeddable(e).is_ok())
    }

    /// Declared type, for error messages
    pub fn declared_type(&self) -> String {
        match self {
            Field::Plain(a) => Self::storage_type(a),
            Field::Optional(a) => format!("Option<{}>", Self::storage_type(a)),
            Field::Relation(r) if r.optional => format!("Option<{}>", r.target.name()),
            Field::Relation(r) if r.association.is_collection() => {
                format!("Collection<{}>", r.target.name())
            }
            Field::Relation(r) => r.target.name().to_string(),
            Field::Joined(j) => {
                let inner = j.last().declared_type();
                if self.is_collection() && !j.last().is_collection() {
                    format!("Collection<{}>", inner)
                } else {
                    inner
                }
            }
            Field::Pseudo(p) => format!("Pseudo<{}>", p.name),
            Field::SelfRef => "Self".into(),
        }
    }

    fn storage_type(a: &Attribute) -> String {
        let inner = a.value_type.type_name();
        if a.is_collection() {
            format!("Collection<{}>", inner)
        } else {
            inner
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Plain(a) => write!(f, "{}", a),
            Field::Optional(a) => write!(f, "Option({})", a),
            Field::Relation(r) => write!(f, "{}->{}", r.association, r.target.name()),
            Field::Joined(j) => {
                let parts: Vec<String> = j.steps.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", parts.join(" / "))
            }
            Field::Pseudo(p) => write!(f, "pseudo:{}", p.name),
            Field::SelfRef => write!(f, "self"),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Constructor;
    use crate::metamodel::{AttributeMeta, CollectionKind, EmbeddableType, EntityType, ValueType};

    fn metamodel() -> Metamodel {
        Metamodel::new()
            .with_embeddable(
                EmbeddableType::new("Address")
                    .attribute(AttributeMeta::basic("city", ValueType::Text).optional()),
            )
            .with_entity(
                EntityType::new("Employee", "id")
                    .attribute(AttributeMeta::basic("name", ValueType::Text))
                    .attribute(AttributeMeta::basic("nickname", ValueType::Text).optional())
                    .attribute(AttributeMeta::association("department", "Department"))
                    .attribute(AttributeMeta::association("mentor", "Employee").optional())
                    .attribute(AttributeMeta::embedded("address", "Address"))
                    .attribute(AttributeMeta::plural(
                        "phones",
                        ValueType::Text,
                        CollectionKind::List,
                    )),
            )
            .with_entity(
                EntityType::new("Department", "id")
                    .attribute(AttributeMeta::basic("name", ValueType::Text)),
            )
    }

    fn attr(mm: &Metamodel, entity: &str, name: &str) -> Attribute {
        mm.attribute(entity, name).unwrap()
    }

    #[test]
    fn test_plain_over_optional_needs_wrapping() {
        let mm = metamodel();
        let err = Field::plain(attr(&mm, "Employee", "nickname")).unwrap_err();
        assert!(matches!(err, QueryError::OptionalAttributeNeedsWrapping { .. }));
    }

    #[test]
    fn test_optional_over_required_rejected() {
        let mm = metamodel();
        let err = Field::optional(attr(&mm, "Employee", "name")).unwrap_err();
        assert!(matches!(err, QueryError::RequiredAttributeMustNotBeWrapped { .. }));

        // embedded fields are always required
        let err = Field::optional(attr(&mm, "Employee", "address")).unwrap_err();
        assert!(matches!(err, QueryError::RequiredAttributeMustNotBeWrapped { .. }));
    }

    #[test]
    fn test_markers_exempt_from_consistency() {
        assert!(Field::self_ref().check_consistency().is_ok());
        assert!(Field::constant("k", Value::Int(1)).check_consistency().is_ok());
        assert!(!Field::self_ref().is_required());
        assert!(Field::self_ref().is_marker());
    }

    #[test]
    fn test_is_required() {
        let mm = metamodel();
        assert!(Field::plain(attr(&mm, "Employee", "name")).unwrap().is_required());
        assert!(!Field::optional(attr(&mm, "Employee", "nickname"))
            .unwrap()
            .is_required());
        let phones = Field::plain(attr(&mm, "Employee", "phones")).unwrap();
        assert!(!phones.is_required());
        assert!(phones.is_collection());
        assert!(phones.is_list());
    }

    #[test]
    fn test_relation_consistency() {
        let mm = metamodel();
        let dept = Constructor::value(Field::plain(attr(&mm, "Department", "name")).unwrap());

        assert!(Field::relation(attr(&mm, "Employee", "department"), dept.clone()).is_ok());
        assert!(matches!(
            Field::relation(attr(&mm, "Employee", "mentor"), dept.clone()),
            Err(QueryError::OptionalAttributeNeedsWrapping { .. })
        ));
        assert!(matches!(
            Field::optional_relation(attr(&mm, "Employee", "department"), dept.clone()),
            Err(QueryError::RequiredAttributeMustNotBeWrapped { .. })
        ));
        assert!(matches!(
            Field::relation(attr(&mm, "Employee", "name"), dept),
            Err(QueryError::IllegalDescriptorComposition(_))
        ));
    }

    #[test]
    fn test_joined_path() {
        let mm = metamodel();
        let path = Field::plain(attr(&mm, "Employee", "department"))
            .unwrap()
            .join(Field::plain(attr(&mm, "Department", "name")).unwrap())
            .unwrap();
        assert_eq!(path.steps().unwrap().len(), 2);
        assert!(path.is_required());
        assert_eq!(path.declared_type(), "Text");
        assert_eq!(path.attribute().unwrap().name, "name");
    }

    #[test]
    fn test_joined_path_flattens_and_checks_links() {
        let mm = metamodel();
        let mentor = Field::optional(attr(&mm, "Employee", "mentor")).unwrap();
        let dept = Field::plain(attr(&mm, "Employee", "department")).unwrap();
        let name = Field::plain(attr(&mm, "Department", "name")).unwrap();

        let inner = dept.clone().join(name.clone()).unwrap();
        let path = mentor.join(inner).unwrap();
        assert_eq!(path.steps().unwrap().len(), 3);
        // optional hop makes the whole path optional
        assert!(!path.is_required());

        // Department.name does not continue from Employee.name
        let bad = Field::plain(attr(&mm, "Employee", "name")).unwrap().join(name);
        assert!(matches!(bad, Err(QueryError::IllegalDescriptorComposition(_))));
    }

    #[test]
    fn test_joined_rejects_derived_intermediate_steps() {
        let mm = metamodel();
        let name = Field::plain(attr(&mm, "Department", "name")).unwrap();
        let dept = Constructor::value(name.clone());
        let relation = Field::relation(attr(&mm, "Employee", "department"), dept).unwrap();

        let err = relation.join(name.clone()).unwrap_err();
        assert!(matches!(err, QueryError::IllegalDescriptorComposition(_)));

        let err = Field::constant("p", Value::Int(1)).join(name).unwrap_err();
        assert!(matches!(err, QueryError::IllegalDescriptorComposition(_)));

        let err = Field::joined(Vec::new()).unwrap_err();
        assert!(matches!(err, QueryError::IllegalDescriptorComposition(_)));
    }

    #[test]
    fn test_embeddable_type() {
        let mm = metamodel();
        let address = Field::plain(attr(&mm, "Employee", "address")).unwrap();
        assert_eq!(address.embeddable_type(), Some("Address"));
        assert!(address.is_embedded(&mm));
        assert!(!address.is_embedded(&Metamodel::new()));
        assert_eq!(Field::self_ref().embeddable_type(), None);

        // a relation whose target has one embedded parameter counts too
        let wrapper = Constructor::value(address);
        let mentor = attr(&mm, "Employee", "mentor");
        let relation = Field::optional_relation(mentor, wrapper).unwrap();
        assert!(relation.is_embedded(&mm));
    }

    #[test]
    fn test_display() {
        let mm = metamodel();
        let nick = Field::optional(attr(&mm, "Employee", "nickname")).unwrap();
        assert_eq!(nick.to_string(), "Option(Employee.nickname)");
        assert_eq!(nick.declared_type(), "Option<Text>");
    }
}
