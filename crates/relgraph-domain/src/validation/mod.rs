//! Authorization model validation.
//!
//! Validates that authorization models are semantically correct:
//! - No cyclic relation definitions
//! - All referenced types exist
//! - All referenced relations exist
//! - Type constraints reference defined types and relations

use std::collections::{HashMap, HashSet};

use crate::error::DomainError;
use crate::model::{AuthorizationModel, TypeConstraint, TypeDefinition, Userset};

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A relation definition contains a cycle
    CyclicRelation {
        type_name: String,
        relation_name: String,
        cycle_path: Vec<String>,
    },
    /// A referenced relation does not exist
    UndefinedRelation {
        type_name: String,
        relation_name: String,
        referenced_relation: String,
    },
    /// A tuple-to-userset computed relation exists on none of the tupleset's types
    UndefinedTuplesetTarget {
        type_name: String,
        relation_name: String,
        tupleset: String,
        computed_userset: String,
    },
    /// Type constraint references undefined type or relation
    InvalidTypeConstraint {
        type_name: String,
        relation_name: String,
        invalid_type: String,
    },
    /// A type is defined more than once
    DuplicateType { type_name: String },
    /// A relation is defined more than once on the same type
    DuplicateRelation {
        type_name: String,
        relation_name: String,
    },
    /// Empty model (no type definitions)
    EmptyModel,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::CyclicRelation {
                type_name,
                relation_name,
                cycle_path,
            } => write!(
                f,
                "cyclic relation definition in {}#{}: {}",
                type_name,
                relation_name,
                cycle_path.join(" -> ")
            ),
            ValidationError::UndefinedRelation {
                type_name,
                relation_name,
                referenced_relation,
            } => write!(
                f,
                "undefined relation '{}' referenced in {}#{}",
                referenced_relation, type_name, relation_name
            ),
            ValidationError::UndefinedTuplesetTarget {
                type_name,
                relation_name,
                tupleset,
                computed_userset,
            } => write!(
                f,
                "'{} from {}' in {}#{}: no type reachable through '{}' defines '{}'",
                computed_userset, tupleset, type_name, relation_name, tupleset, computed_userset
            ),
            ValidationError::InvalidTypeConstraint {
                type_name,
                relation_name,
                invalid_type,
            } => write!(
                f,
                "invalid type constraint '{}' in {}#{}",
                invalid_type, type_name, relation_name
            ),
            ValidationError::DuplicateType { type_name } => {
                write!(f, "type '{}' is defined more than once", type_name)
            }
            ValidationError::DuplicateRelation {
                type_name,
                relation_name,
            } => write!(
                f,
                "relation '{}' is defined more than once on type '{}'",
                relation_name, type_name
            ),
            ValidationError::EmptyModel => {
                write!(f, "model must have at least one type definition")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, Vec<ValidationError>>;

/// Collapses validation errors into a single domain error.
///
/// A cycle is reported as `ModelCycle` (the first one found); everything else
/// becomes `ModelValidation` with all messages joined.
pub fn into_domain_error(errors: Vec<ValidationError>) -> DomainError {
    let cycle = errors.iter().find_map(|e| match e {
        ValidationError::CyclicRelation {
            type_name,
            relation_name,
            cycle_path,
        } => Some(DomainError::ModelCycle {
            type_name: type_name.clone(),
            relation: relation_name.clone(),
            path: cycle_path.join(" -> "),
        }),
        _ => None,
    });
    cycle.unwrap_or_else(|| DomainError::ModelValidation {
        message: errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    })
}

/// Model validator
pub struct ModelValidator<'m> {
    /// Type definitions keyed by name
    types: HashMap<&'m str, &'m TypeDefinition>,
    /// Relations defined on each type: type_name -> [relation_names]
    type_relations: HashMap<&'m str, HashSet<&'m str>>,
}

impl<'m> ModelValidator<'m> {
    /// Create a new validator for the given model
    pub fn new(model: &'m AuthorizationModel) -> Self {
        let mut types = HashMap::new();
        let mut type_relations = HashMap::new();

        for type_def in &model.type_definitions {
            types.insert(type_def.type_name.as_str(), type_def);
            let relations: HashSet<&str> =
                type_def.relations.iter().map(|r| r.name.as_str()).collect();
            type_relations.insert(type_def.type_name.as_str(), relations);
        }

        Self {
            types,
            type_relations,
        }
    }

    /// Validate the model and return any errors found
    pub fn validate(&self, model: &AuthorizationModel) -> ValidationResult<()> {
        let mut errors = Vec::new();

        // Check for empty model
        if model.type_definitions.is_empty() {
            errors.push(ValidationError::EmptyModel);
            return Err(errors);
        }

        let mut seen_types = HashSet::new();
        for type_def in &model.type_definitions {
            if !seen_types.insert(type_def.type_name.as_str()) {
                errors.push(ValidationError::DuplicateType {
                    type_name: type_def.type_name.clone(),
                });
            }
            self.validate_type_definition(type_def, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a single type definition
    fn validate_type_definition(
        &self,
        type_def: &TypeDefinition,
        errors: &mut Vec<ValidationError>,
    ) {
        let mut seen_relations = HashSet::new();
        for relation_def in &type_def.relations {
            if !seen_relations.insert(relation_def.name.as_str()) {
                errors.push(ValidationError::DuplicateRelation {
                    type_name: type_def.type_name.clone(),
                    relation_name: relation_def.name.clone(),
                });
            }

            self.validate_type_constraints(
                &type_def.type_name,
                &relation_def.name,
                &relation_def.type_constraints,
                errors,
            );

            self.validate_userset(
                type_def,
                &relation_def.name,
                &relation_def.rewrite,
                errors,
            );
        }

        // Check for cycles at the type level
        if let Some((relation_name, cycle_path)) = Self::detect_cycle_in_type(type_def) {
            errors.push(ValidationError::CyclicRelation {
                type_name: type_def.type_name.clone(),
                relation_name,
                cycle_path,
            });
        }
    }

    /// Validate type constraints (e.g., [user], [user:*], [group#member])
    fn validate_type_constraints(
        &self,
        type_name: &str,
        relation_name: &str,
        constraints: &[TypeConstraint],
        errors: &mut Vec<ValidationError>,
    ) {
        for constraint in constraints {
            let (ref_type, ref_relation, _) = constraint.parts();

            let valid = self.type_exists(ref_type)
                && ref_relation.map_or(true, |relation| self.relation_exists(ref_type, relation));

            if !valid {
                errors.push(ValidationError::InvalidTypeConstraint {
                    type_name: type_name.to_string(),
                    relation_name: relation_name.to_string(),
                    invalid_type: constraint.type_name.clone(),
                });
            }
        }
    }

    /// Validate a userset expression
    fn validate_userset(
        &self,
        type_def: &TypeDefinition,
        relation_name: &str,
        userset: &Userset,
        errors: &mut Vec<ValidationError>,
    ) {
        let type_name = type_def.type_name.as_str();
        match userset {
            Userset::This => {
                // Direct assignment, always valid
            }
            Userset::ComputedUserset { relation } => {
                if !self.relation_exists(type_name, relation) {
                    errors.push(ValidationError::UndefinedRelation {
                        type_name: type_name.to_string(),
                        relation_name: relation_name.to_string(),
                        referenced_relation: relation.clone(),
                    });
                }
            }
            Userset::TupleToUserset {
                tupleset,
                computed_userset,
            } => {
                // The tupleset must be a relation on this type
                let Some(tupleset_def) = type_def.relations.iter().find(|r| &r.name == tupleset)
                else {
                    errors.push(ValidationError::UndefinedRelation {
                        type_name: type_name.to_string(),
                        relation_name: relation_name.to_string(),
                        referenced_relation: tupleset.clone(),
                    });
                    return;
                };

                // The computed relation must exist on at least one type the
                // tupleset can point at
                let reachable = if tupleset_def.type_constraints.is_empty() {
                    self.type_relations
                        .values()
                        .any(|relations| relations.contains(computed_userset.as_str()))
                } else {
                    tupleset_def.type_constraints.iter().any(|constraint| {
                        let (target_type, _, _) = constraint.parts();
                        self.relation_exists(target_type, computed_userset)
                    })
                };
                if !reachable {
                    errors.push(ValidationError::UndefinedTuplesetTarget {
                        type_name: type_name.to_string(),
                        relation_name: relation_name.to_string(),
                        tupleset: tupleset.clone(),
                        computed_userset: computed_userset.clone(),
                    });
                }
            }
            Userset::Union { children } | Userset::Intersection { children } => {
                for child in children {
                    self.validate_userset(type_def, relation_name, child, errors);
                }
            }
            Userset::Exclusion { base, subtract } => {
                self.validate_userset(type_def, relation_name, base, errors);
                self.validate_userset(type_def, relation_name, subtract, errors);
            }
        }
    }

    /// Check if a type exists in the model
    pub fn type_exists(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Check if a relation exists on a type
    pub fn relation_exists(&self, type_name: &str, relation_name: &str) -> bool {
        self.type_relations
            .get(type_name)
            .is_some_and(|relations| relations.contains(relation_name))
    }

    /// Detect cycles in relation definitions using DFS
    fn detect_cycle_in_type(type_def: &TypeDefinition) -> Option<(String, Vec<String>)> {
        // Build adjacency list: relation -> [referenced relations]
        let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
        for rel_def in &type_def.relations {
            let mut refs = Vec::new();
            collect_referenced_relations(&rel_def.rewrite, &mut refs);
            graph.insert(rel_def.name.as_str(), refs);
        }

        // DFS to find cycles, in declaration order so the reported path is stable
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for rel_def in &type_def.relations {
            if dfs_cycle_detect(
                &rel_def.name,
                &graph,
                &mut visited,
                &mut rec_stack,
                &mut path,
            ) {
                return Some((rel_def.name.clone(), path));
            }
        }
        None
    }
}

/// Collect all same-object relations referenced from a userset expression
fn collect_referenced_relations<'a>(userset: &'a Userset, refs: &mut Vec<&'a str>) {
    userset.walk(&mut |node| {
        // Tuple to userset goes to a different object, no type-level cycle
        if let Userset::ComputedUserset { relation } = node {
            refs.push(relation.as_str());
        }
    });
}

/// DFS-based cycle detection in relation graph
fn dfs_cycle_detect<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<String>,
) -> bool {
    if rec_stack.contains(node) {
        // Found a cycle
        path.push(node.to_string());
        return true;
    }
    if visited.contains(node) {
        return false;
    }

    visited.insert(node);
    rec_stack.insert(node);
    path.push(node.to_string());

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            // Only follow edges to relations that exist in this type
            if graph.contains_key(neighbor)
                && dfs_cycle_detect(neighbor, graph, visited, rec_stack, path)
            {
                return true;
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

/// Validate an authorization model
pub fn validate(model: &AuthorizationModel) -> ValidationResult<()> {
    let validator = ModelValidator::new(model);
    validator.validate(model)
}
