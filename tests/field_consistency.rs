//! Field Consistency Tests
//!
//! Descriptors are checked against storage metadata when they are built:
//! - A plain descriptor needs a required attribute
//! - An optional descriptor needs a nullable attribute
//! - Joined paths must link declaring types hop by hop
//! - Required-ness of a path follows its hops

use proptest::prelude::*;
use querylens::metamodel::{Attribute, AttributeMeta, EntityType, ValueType};
use querylens::{ConstructorBuilder, Field, Metamodel, QueryError, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn metamodel() -> Metamodel {
    Metamodel::from_json(
        r#"{
            "entities": [
                {
                    "name": "Employee",
                    "id": { "name": "id", "type": "int" },
                    "attributes": [
                        { "name": "name", "type": "text" },
                        { "name": "nickname", "type": "text", "optional": true },
                        { "name": "department", "type": { "entity": "Department" } },
                        { "name": "mentor", "type": { "entity": "Employee" }, "optional": true },
                        { "name": "phones", "type": "text", "collection": "list" }
                    ]
                },
                {
                    "name": "Department",
                    "id": { "name": "id", "type": "int" },
                    "attributes": [
                        { "name": "name", "type": "text" },
                        { "name": "code", "type": "text", "optional": true }
                    ]
                }
            ]
        }"#,
    )
    .unwrap()
}

fn attr(mm: &Metamodel, entity: &str, name: &str) -> Attribute {
    mm.attribute(entity, name).unwrap()
}

fn name_of(mm: &Metamodel, entity: &str) -> querylens::Constructor<String> {
    ConstructorBuilder::new(format!("{}Name", entity))
        .param(Field::plain(attr(mm, entity, "name")).unwrap())
        .build(|args| args.next())
}

// =============================================================================
// Wrapper Consistency Tests
// =============================================================================

proptest! {
    /// A descriptor builds exactly when its wrapper matches storage nullability
    #[test]
    fn test_wrapper_matches_nullability(nullable in any::<bool>(), wrapped in any::<bool>()) {
        let mut meta = AttributeMeta::basic("value", ValueType::Int);
        if nullable {
            meta = meta.optional();
        }
        let mm = Metamodel::new().with_entity(EntityType::new("Thing", "id").attribute(meta));
        let attribute = attr(&mm, "Thing", "value");

        let built = if wrapped {
            Field::optional(attribute)
        } else {
            Field::plain(attribute)
        };
        match (nullable, wrapped) {
            (true, true) | (false, false) => prop_assert!(built.is_ok()),
            (true, false) => prop_assert!(
                matches!(built, Err(QueryError::OptionalAttributeNeedsWrapping { .. })),
                "plain over nullable must fail"
            ),
            (false, true) => prop_assert!(
                matches!(built, Err(QueryError::RequiredAttributeMustNotBeWrapped { .. })),
                "optional over required must fail"
            ),
        }
    }
}

/// Errors name the declaring type and attribute
#[test]
fn test_error_names_attribute() {
    let mm = metamodel();
    let err = Field::plain(attr(&mm, "Employee", "nickname")).unwrap_err();
    assert_eq!(
        err,
        QueryError::OptionalAttributeNeedsWrapping {
            declaring: "Employee".into(),
            attribute: "nickname".into(),
        }
    );
    assert!(err.is_build_time());
    assert_eq!(err.code(), "QL_OPTIONAL_NEEDS_WRAPPING");
}

/// Relations follow the same rule through the association
#[test]
fn test_relation_wrapping() {
    let mm = metamodel();
    let department = attr(&mm, "Employee", "department");
    let mentor = attr(&mm, "Employee", "mentor");

    assert!(Field::relation(department.clone(), name_of(&mm, "Department")).is_ok());
    assert!(matches!(
        Field::optional_relation(department, name_of(&mm, "Department")),
        Err(QueryError::RequiredAttributeMustNotBeWrapped { .. })
    ));
    assert!(matches!(
        Field::relation(mentor.clone(), name_of(&mm, "Employee")),
        Err(QueryError::OptionalAttributeNeedsWrapping { .. })
    ));
    assert!(Field::optional_relation(mentor, name_of(&mm, "Employee")).is_ok());

    // relations need an association
    assert!(matches!(
        Field::relation(attr(&mm, "Employee", "name"), name_of(&mm, "Employee")),
        Err(QueryError::IllegalDescriptorComposition(_))
    ));
}

/// Collections are required by storage and never need wrapping
#[test]
fn test_collections_are_required() {
    let mm = metamodel();
    let phones = Field::plain(attr(&mm, "Employee", "phones")).unwrap();
    assert!(phones.is_collection());
    assert!(phones.is_list());
    assert!(!phones.is_required());
    assert!(Field::optional(attr(&mm, "Employee", "phones")).is_err());
}

// =============================================================================
// Joined Path Tests
// =============================================================================

/// Each hop must be declared by the previous hop's target
#[test]
fn test_joined_path_links_types() {
    let mm = metamodel();
    let department = Field::plain(attr(&mm, "Employee", "department")).unwrap();

    let path = department
        .clone()
        .join(Field::plain(attr(&mm, "Department", "name")).unwrap())
        .unwrap();
    assert!(path.is_required());
    assert_eq!(path.steps().map(<[Field]>::len), Some(2));

    let err = department
        .join(Field::plain(attr(&mm, "Employee", "name")).unwrap())
        .unwrap_err();
    assert!(matches!(err, QueryError::IllegalDescriptorComposition(_)));
}

/// A path through an optional hop is not required
#[test]
fn test_optional_hop_makes_path_optional() {
    let mm = metamodel();
    let path = Field::optional(attr(&mm, "Employee", "mentor"))
        .unwrap()
        .join(Field::plain(attr(&mm, "Employee", "name")).unwrap())
        .unwrap();
    assert!(!path.is_required());

    let optional_leaf = Field::plain(attr(&mm, "Employee", "department"))
        .unwrap()
        .join(Field::optional(attr(&mm, "Department", "code")).unwrap())
        .unwrap();
    assert!(!optional_leaf.is_required());
}

/// Nested joined paths flatten into one path
#[test]
fn test_joined_paths_flatten() {
    let mm = metamodel();
    let mentor = Field::optional(attr(&mm, "Employee", "mentor")).unwrap();
    let department = Field::plain(attr(&mm, "Employee", "department")).unwrap();
    let inner = mentor.join(department).unwrap();
    let full = inner
        .join(Field::plain(attr(&mm, "Department", "name")).unwrap())
        .unwrap();
    assert_eq!(full.steps().map(<[Field]>::len), Some(3));
}

/// Only plain associations can be joined through
#[test]
fn test_non_association_hop_rejected() {
    let mm = metamodel();
    let name = Field::plain(attr(&mm, "Employee", "name")).unwrap();
    assert!(matches!(
        name.join(Field::plain(attr(&mm, "Department", "name")).unwrap()),
        Err(QueryError::IllegalDescriptorComposition(_))
    ));
    assert!(matches!(
        Field::self_ref().join(Field::constant("c", Value::Int(1))),
        Err(QueryError::IllegalDescriptorComposition(_))
    ));
    assert!(matches!(
        Field::joined(vec![]),
        Err(QueryError::IllegalDescriptorComposition(_))
    ));
}

/// Markers are never required and never wrapped
#[test]
fn test_markers() {
    let constant = Field::constant("c", Value::Int(1));
    assert!(constant.is_marker());
    assert!(!constant.is_required());
    assert!(constant.check_consistency().is_ok());
    assert!(Field::self_ref().is_marker());
}
