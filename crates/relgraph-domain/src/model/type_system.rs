//! Validated, immutable model snapshot.
//!
//! A `Model` is built once from an `AuthorizationModel`, after validation,
//! and then shared as `Arc<Model>` by every request that pins it. Besides
//! forward lookups (type + relation -> rewrite) it precomputes the reverse
//! rewrite graph used by the reverse ListObjects strategy.

use std::collections::HashMap;

use crate::error::{DomainError, DomainResult};
use crate::validation;

use super::types::{constraints_admit, AuthorizationModel, RelationDefinition, Userset};

/// A relation that reaches another relation through a tuple-to-userset rewrite.
///
/// For `document#viewer = viewer from parent`, the entry stored under
/// `viewer` is `{ object_type: "document", relation: "viewer", tupleset: "parent" }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtuDependent {
    /// Type that declares the tuple-to-userset rewrite.
    pub object_type: String,
    /// Relation whose rewrite contains the tuple-to-userset.
    pub relation: String,
    /// Tupleset relation followed to reach the related object.
    pub tupleset: String,
}

/// Immutable, validated authorization model.
#[derive(Debug)]
pub struct Model {
    id: Option<String>,
    schema_version: String,
    /// Type names in declaration order.
    type_names: Vec<String>,
    /// type -> relation -> definition.
    relations: HashMap<String, HashMap<String, RelationDefinition>>,
    /// (type, relation) pairs whose rewrite contains `This`.
    direct_relations: Vec<(String, String)>,
    /// (type, relation) -> relations on the same type that reference it.
    computed_dependents: HashMap<(String, String), Vec<String>>,
    /// computed relation name -> tuple-to-userset rewrites that evaluate it.
    ttu_dependents: HashMap<String, Vec<TtuDependent>>,
}

impl Model {
    /// Validates an authorization model and builds the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ModelCycle` for type-level cycles and
    /// `DomainError::ModelValidation` for every other definition problem.
    pub fn new(model: AuthorizationModel) -> DomainResult<Self> {
        validation::validate(&model).map_err(validation::into_domain_error)?;

        let mut type_names = Vec::with_capacity(model.type_definitions.len());
        let mut relations = HashMap::with_capacity(model.type_definitions.len());
        let mut direct_relations = Vec::new();
        let mut computed_dependents: HashMap<(String, String), Vec<String>> = HashMap::new();
        let mut ttu_dependents: HashMap<String, Vec<TtuDependent>> = HashMap::new();

        for type_def in model.type_definitions {
            let type_name = type_def.type_name;
            let mut by_name = HashMap::with_capacity(type_def.relations.len());

            for relation_def in type_def.relations {
                if relation_def.rewrite.contains_this() {
                    direct_relations.push((type_name.clone(), relation_def.name.clone()));
                }

                relation_def.rewrite.walk(&mut |node| match node {
                    Userset::ComputedUserset { relation } => {
                        let dependents = computed_dependents
                            .entry((type_name.clone(), relation.clone()))
                            .or_default();
                        if !dependents.contains(&relation_def.name) {
                            dependents.push(relation_def.name.clone());
                        }
                    }
                    Userset::TupleToUserset {
                        tupleset,
                        computed_userset,
                    } => {
                        let dependent = TtuDependent {
                            object_type: type_name.clone(),
                            relation: relation_def.name.clone(),
                            tupleset: tupleset.clone(),
                        };
                        let dependents = ttu_dependents.entry(computed_userset.clone()).or_default();
                        if !dependents.contains(&dependent) {
                            dependents.push(dependent);
                        }
                    }
                    _ => {}
                });

                by_name.insert(relation_def.name.clone(), relation_def);
            }

            type_names.push(type_name.clone());
            relations.insert(type_name, by_name);
        }

        Ok(Self {
            id: model.id,
            schema_version: model.schema_version,
            type_names,
            relations,
            direct_relations,
            computed_dependents,
            ttu_dependents,
        })
    }

    /// Model identifier, if the model came from a store.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Schema version of the source model.
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Type names in declaration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.type_names.iter().map(String::as_str)
    }

    /// Returns true if the type is defined.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.relations.contains_key(type_name)
    }

    /// Returns true if the relation is defined on the type.
    pub fn has_relation(&self, type_name: &str, relation: &str) -> bool {
        self.relations
            .get(type_name)
            .is_some_and(|relations| relations.contains_key(relation))
    }

    /// Looks up the definition of `type_name#relation`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownRelation` when either the type or the
    /// relation is not part of this snapshot.
    pub fn resolve(&self, type_name: &str, relation: &str) -> DomainResult<&RelationDefinition> {
        self.relations
            .get(type_name)
            .and_then(|relations| relations.get(relation))
            .ok_or_else(|| DomainError::UnknownRelation {
                type_name: type_name.to_string(),
                relation: relation.to_string(),
            })
    }

    /// Directly assignable (type, relation) pairs whose type constraints
    /// admit a subject of the given shape.
    pub fn direct_relations_accepting(
        &self,
        subject_type: &str,
        subject_relation: Option<&str>,
        wildcard: bool,
    ) -> Vec<(&str, &str)> {
        self.direct_relations
            .iter()
            .filter(|(type_name, relation)| {
                self.resolve(type_name, relation).is_ok_and(|def| {
                    constraints_admit(&def.type_constraints, subject_type, subject_relation, wildcard)
                })
            })
            .map(|(type_name, relation)| (type_name.as_str(), relation.as_str()))
            .collect()
    }

    /// Relations on `type_name` whose rewrite references `relation` as a
    /// computed userset.
    pub fn computed_dependents(&self, type_name: &str, relation: &str) -> &[String] {
        self.computed_dependents
            .get(&(type_name.to_string(), relation.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Tuple-to-userset rewrites whose computed relation is `relation`.
    pub fn ttu_dependents(&self, relation: &str) -> &[TtuDependent] {
        self.ttu_dependents
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
