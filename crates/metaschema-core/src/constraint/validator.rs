//! Two-phase constraint validation.
//!
//! Phase 1 (`Building`) evaluates every `Index` constraint against the
//! document root and fills the index registry. Phase 2 (`Checking`) runs all
//! other constraint kinds against the frozen registry, walking the document
//! in document order. Work in either phase can be split across scoped worker
//! threads, whose results are merged in chunk order so the output does not
//! depend on scheduling.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic;
use std::thread;

use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use super::finding::{Finding, FindingKind, ValidationReport};
use super::index::{IndexRegistry, IndexRegistryBuilder, InsertOutcome};
use super::key::{CompositeKey, KeyResolutionError, KeyResolver};
use super::message::render_template;
use crate::config::ValidationConfig;
use crate::datatype::DatatypeRegistry;
use crate::document::{DocumentTree, NodeId};
use crate::error::{ConfigError, Error};
use crate::model::{Constraint, ConstraintKind, ConstraintSet, DefinitionRef, Level, Schema};
use crate::path::{EvaluationError, PathEvaluator};

/// Lifecycle of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationPhase {
    /// Index constraints are being evaluated; nothing else runs.
    Building,
    /// The registry is frozen; all other constraints run.
    Checking,
    /// Findings are final.
    Done,
}

impl ValidationPhase {
    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            ValidationPhase::Building => ValidationPhase::Checking,
            ValidationPhase::Checking | ValidationPhase::Done => ValidationPhase::Done,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPhase::Building => "building",
            ValidationPhase::Checking => "checking",
            ValidationPhase::Done => "done",
        }
    }
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only state shared by phase-2 workers.
struct CheckContext<'r> {
    tree: &'r dyn DocumentTree,
    registry: &'r IndexRegistry,
    /// First node of each definition, where missing-index findings are reported.
    first_instance: HashMap<&'r DefinitionRef, NodeId>,
    /// Per-worker finding budget.
    budget: Option<usize>,
}

/// Validates documents against a schema.
///
/// A validator is cheap to create and holds no per-run state; the same
/// validator can check any number of documents, also from several threads.
pub struct Validator<'a> {
    schema: &'a Schema,
    evaluator: &'a dyn PathEvaluator,
    datatypes: &'a dyn DatatypeRegistry,
    config: ValidationConfig,
}

impl<'a> Validator<'a> {
    /// Create a validator.
    ///
    /// Fails if a `Matches` constraint names a datatype the registry does not know.
    pub fn new(
        schema: &'a Schema,
        evaluator: &'a dyn PathEvaluator,
        datatypes: &'a dyn DatatypeRegistry,
    ) -> Result<Self, Error> {
        check_datatypes(schema, datatypes)?;
        warn_undeclared_indexes(schema);
        Ok(Self {
            schema,
            evaluator,
            datatypes,
            config: ValidationConfig::default(),
        })
    }

    /// Use a run configuration.
    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a document.
    ///
    /// Every run completes; resolution and evaluation problems become findings.
    #[instrument(skip(self, tree))]
    pub fn validate(&self, tree: &dyn DocumentTree) -> ValidationReport {
        let nodes = tree.walk();
        let mut phase = ValidationPhase::Building;
        info!(
            phase = %phase,
            nodes = nodes.len(),
            workers = self.config.workers_for(nodes.len()),
            "Starting validation"
        );

        let (registry, mut findings) = self.build_indexes(tree);

        phase = phase.next();
        info!(
            phase = %phase,
            indexes = registry.len(),
            findings = findings.len(),
            "Index registry frozen"
        );

        let budget = self
            .config
            .max_findings
            .map(|max| max.saturating_sub(findings.len()));
        let (checked, mut truncated) = self.check(tree, &nodes, &registry, budget);
        findings.extend(checked);

        if let Some(max) = self.config.max_findings {
            if findings.len() > max {
                findings.truncate(max);
                truncated = true;
            }
        }

        phase = phase.next();
        info!(
            phase = %phase,
            findings = findings.len(),
            truncated,
            "Validation finished"
        );

        ValidationReport {
            findings,
            truncated,
        }
    }

    // --- Phase 1 ---

    fn build_indexes(&self, tree: &dyn DocumentTree) -> (IndexRegistry, Vec<Finding>) {
        let mut builder = IndexRegistryBuilder::new();
        let mut findings = Vec::new();

        for (definition, constraint) in self.schema.index_declarations() {
            let ConstraintKind::Index { name, key_fields } = &constraint.kind else {
                continue;
            };
            builder.declare(name);

            // Targets are selected from the document root.
            let root = tree.root();
            let targets = match self.evaluator.select(tree, root, &constraint.target) {
                Ok(targets) => targets,
                Err(e) => {
                    findings.push(evaluation_failed(tree, constraint, root, &e));
                    continue;
                }
            };
            debug!(
                index = %name,
                definition = %definition,
                targets = targets.len(),
                "Indexing targets"
            );

            let resolved = run_chunked(&targets, self.config.workers_for(targets.len()), |chunk| {
                let resolver = KeyResolver::new(tree, self.evaluator);
                chunk
                    .iter()
                    .map(|&target| (target, resolver.resolve(target, key_fields)))
                    .collect::<Vec<_>>()
            });

            for (target, result) in resolved.into_iter().flatten() {
                let key = match result {
                    Ok(key) => key,
                    Err(e) => {
                        findings.push(key_failure(tree, constraint, target, &e));
                        continue;
                    }
                };
                if let InsertOutcome::Duplicate { existing } =
                    builder.insert(name, key.clone(), target)
                {
                    debug!(index = %name, key = %key, "Duplicate index key");
                    findings.push(
                        Finding::new(
                            FindingKind::DuplicateIndexKey,
                            Level::Error,
                            constraint,
                            target,
                            format!(
                                "key {} at {} is already in index '{}' from {}",
                                key,
                                tree.display_path(target),
                                name,
                                tree.display_path(existing)
                            ),
                        )
                        .with_related([existing]),
                    );
                }
            }
        }

        (builder.finish(), findings)
    }

    // --- Phase 2 ---

    fn check(
        &self,
        tree: &dyn DocumentTree,
        nodes: &[NodeId],
        registry: &IndexRegistry,
        budget: Option<usize>,
    ) -> (Vec<Finding>, bool) {
        if budget == Some(0) {
            return (Vec::new(), !nodes.is_empty());
        }

        let mut first_instance = HashMap::new();
        for &node in nodes {
            first_instance.entry(tree.definition(node)).or_insert(node);
        }
        let context = CheckContext {
            tree,
            registry,
            first_instance,
            budget,
        };

        // One entry per checked node, so the budget can be applied in document order.
        let per_node = run_chunked(nodes, self.config.workers_for(nodes.len()), |chunk| {
            let mut results = Vec::with_capacity(chunk.len());
            let mut produced = 0;
            for &node in chunk {
                if context.budget.is_some_and(|b| produced >= b) {
                    break;
                }
                let found = self.check_node(&context, node);
                produced += found.len();
                results.push(found);
            }
            results
        });

        let mut findings = Vec::new();
        let mut checked = 0;
        for found in per_node.into_iter().flatten() {
            checked += 1;
            findings.extend(found);
            if let Some(budget) = budget {
                if findings.len() >= budget {
                    let truncated = checked < nodes.len() || findings.len() > budget;
                    findings.truncate(budget);
                    debug!(budget, checked, "Finding budget reached");
                    return (findings, truncated);
                }
            }
        }
        (findings, false)
    }

    fn check_node(&self, context: &CheckContext<'_>, node: NodeId) -> Vec<Finding> {
        let mut findings = Vec::new();
        let Some(set) = self.schema.get(context.tree.definition(node)) else {
            return findings;
        };

        self.check_allowed_values(context.tree, set, node, &mut findings);
        self.check_matches(context.tree, set, node, &mut findings);
        self.check_expectations(context.tree, set, node, &mut findings);
        self.check_uniques(context.tree, set, node, &mut findings);
        self.check_index_has_keys(context, set, node, &mut findings);
        self.check_cardinalities(context.tree, set, node, &mut findings);
        findings
    }

    fn select_targets(
        &self,
        tree: &dyn DocumentTree,
        constraint: &Constraint,
        node: NodeId,
        findings: &mut Vec<Finding>,
    ) -> Vec<NodeId> {
        match self.evaluator.select(tree, node, &constraint.target) {
            Ok(targets) => targets,
            Err(e) => {
                findings.push(evaluation_failed(tree, constraint, node, &e));
                Vec::new()
            }
        }
    }

    fn check_allowed_values(
        &self,
        tree: &dyn DocumentTree,
        set: &ConstraintSet,
        node: NodeId,
        findings: &mut Vec<Finding>,
    ) {
        for constraint in set.allowed_values() {
            let ConstraintKind::AllowedValues {
                values,
                allow_other,
                ..
            } = &constraint.kind
            else {
                continue;
            };
            for target in self.select_targets(tree, constraint, node, findings) {
                let Some(value) = tree.string_value(target) else {
                    continue;
                };
                if *allow_other || values.contains_key(value) {
                    continue;
                }
                let expected: Vec<&str> = values.keys().map(String::as_str).collect();
                findings.push(Finding::violation(
                    FindingKind::ValueNotAllowed,
                    constraint,
                    target,
                    format!(
                        "value '{}' at {} is not allowed by {}; expected one of: {}",
                        value,
                        tree.display_path(target),
                        constraint.display_id(),
                        expected.join(", ")
                    ),
                ));
            }
        }
    }

    fn check_matches(
        &self,
        tree: &dyn DocumentTree,
        set: &ConstraintSet,
        node: NodeId,
        findings: &mut Vec<Finding>,
    ) {
        for constraint in set.matches() {
            let ConstraintKind::Matches { pattern, datatype } = &constraint.kind else {
                continue;
            };
            for target in self.select_targets(tree, constraint, node, findings) {
                let Some(value) = tree.string_value(target) else {
                    continue;
                };

                if let Some(pattern) = pattern {
                    if !pattern.matches_whole(value) {
                        findings.push(Finding::violation(
                            FindingKind::PatternMismatch,
                            constraint,
                            target,
                            format!(
                                "value '{}' at {} does not match pattern '{}' ({})",
                                value,
                                tree.display_path(target),
                                pattern,
                                constraint.display_id()
                            ),
                        ));
                        continue;
                    }
                }

                if let Some(datatype) = datatype {
                    if let Err(e) = self.datatypes.parse(datatype, value) {
                        findings.push(Finding::violation(
                            FindingKind::DatatypeMismatch,
                            constraint,
                            target,
                            format!(
                                "{} at {} ({})",
                                e,
                                tree.display_path(target),
                                constraint.display_id()
                            ),
                        ));
                    }
                }
            }
        }
    }

    fn check_expectations(
        &self,
        tree: &dyn DocumentTree,
        set: &ConstraintSet,
        node: NodeId,
        findings: &mut Vec<Finding>,
    ) {
        for constraint in set.expectations() {
            let ConstraintKind::Expect { test, message } = &constraint.kind else {
                continue;
            };
            for target in self.select_targets(tree, constraint, node, findings) {
                match self.evaluator.evaluate_boolean(tree, target, test) {
                    Ok(true) => {}
                    Ok(false) => {
                        let text = match message {
                            Some(template) => render_template(template, |expr| {
                                self.evaluator.evaluate_string(tree, target, expr)
                            }),
                            None => format!(
                                "expect constraint '{}' failed: test '{}' evaluated to false at {}",
                                constraint.display_id(),
                                test,
                                tree.display_path(target)
                            ),
                        };
                        findings.push(Finding::violation(
                            FindingKind::ExpectationFailed,
                            constraint,
                            target,
                            text,
                        ));
                    }
                    Err(e) => findings.push(evaluation_failed(tree, constraint, target, &e)),
                }
            }
        }
    }

    fn check_uniques(
        &self,
        tree: &dyn DocumentTree,
        set: &ConstraintSet,
        node: NodeId,
        findings: &mut Vec<Finding>,
    ) {
        let resolver = KeyResolver::new(tree, self.evaluator);

        for constraint in set.uniques() {
            let ConstraintKind::Unique { key_fields } = &constraint.kind else {
                continue;
            };
            let mut seen: IndexMap<CompositeKey, NodeId> = IndexMap::new();
            for target in self.select_targets(tree, constraint, node, findings) {
                let key = match resolver.resolve(target, key_fields) {
                    Ok(key) => key,
                    Err(e) => {
                        findings.push(key_failure(tree, constraint, target, &e));
                        continue;
                    }
                };
                match seen.get(&key) {
                    Some(&first) => findings.push(
                        Finding::violation(
                            FindingKind::DuplicateKey,
                            constraint,
                            target,
                            format!(
                                "duplicate key {} at {}, first used at {} ({})",
                                key,
                                tree.display_path(target),
                                tree.display_path(first),
                                constraint.display_id()
                            ),
                        )
                        .with_related([first]),
                    ),
                    None => {
                        seen.insert(key, target);
                    }
                }
            }
        }
    }

    fn check_index_has_keys(
        &self,
        context: &CheckContext<'_>,
        set: &ConstraintSet,
        node: NodeId,
        findings: &mut Vec<Finding>,
    ) {
        let tree = context.tree;
        let resolver = KeyResolver::new(tree, self.evaluator);

        for constraint in set.index_has_keys() {
            let ConstraintKind::IndexHasKey {
                index_name,
                key_fields,
            } = &constraint.kind
            else {
                continue;
            };

            let Some(table) = context.registry.table(index_name) else {
                // Reported once, at the first instance of the owning definition.
                if context.first_instance.get(tree.definition(node)) == Some(&node) {
                    findings.push(Finding::resolution(
                        FindingKind::MissingIndex,
                        constraint,
                        node,
                        format!("{} references index '{}', which is not declared", constraint, index_name),
                    ));
                }
                continue;
            };

            for target in self.select_targets(tree, constraint, node, findings) {
                let key = match resolver.resolve(target, key_fields) {
                    Ok(key) => key,
                    Err(e) => {
                        findings.push(key_failure(tree, constraint, target, &e));
                        continue;
                    }
                };
                if !table.contains_key(&key) {
                    findings.push(Finding::violation(
                        FindingKind::DanglingReference,
                        constraint,
                        target,
                        format!(
                            "key {} at {} was not found in index '{}' ({})",
                            key,
                            tree.display_path(target),
                            index_name,
                            constraint.display_id()
                        ),
                    ));
                }
            }
        }
    }

    fn check_cardinalities(
        &self,
        tree: &dyn DocumentTree,
        set: &ConstraintSet,
        node: NodeId,
        findings: &mut Vec<Finding>,
    ) {
        for constraint in set.cardinalities() {
            let ConstraintKind::Cardinality {
                min_occurs,
                max_occurs,
            } = &constraint.kind
            else {
                continue;
            };

            let mut counts: IndexMap<NodeId, u32> = IndexMap::new();
            for target in self.select_targets(tree, constraint, node, findings) {
                let parent = tree.parent(target).unwrap_or(node);
                *counts.entry(parent).or_insert(0) += 1;
            }
            if counts.is_empty() {
                counts.insert(node, 0);
            }

            for (parent, count) in counts {
                if let Some(min) = min_occurs.filter(|min| count < *min) {
                    findings.push(Finding::violation(
                        FindingKind::CardinalityBelowMinimum,
                        constraint,
                        parent,
                        format!(
                            "{} occurrence(s) of '{}' under {}, expected at least {} ({})",
                            count,
                            constraint.target,
                            tree.display_path(parent),
                            min,
                            constraint.display_id()
                        ),
                    ));
                }
                if let Some(max) = max_occurs.filter(|max| count > *max) {
                    findings.push(Finding::violation(
                        FindingKind::CardinalityAboveMaximum,
                        constraint,
                        parent,
                        format!(
                            "{} occurrence(s) of '{}' under {}, expected at most {} ({})",
                            count,
                            constraint.target,
                            tree.display_path(parent),
                            max,
                            constraint.display_id()
                        ),
                    ));
                }
            }
        }
    }
}

/// Validate a document with the default configuration.
pub fn validate(
    tree: &dyn DocumentTree,
    schema: &Schema,
    evaluator: &dyn PathEvaluator,
    datatypes: &dyn DatatypeRegistry,
) -> Result<ValidationReport, Error> {
    Ok(Validator::new(schema, evaluator, datatypes)?.validate(tree))
}

fn check_datatypes(schema: &Schema, datatypes: &dyn DatatypeRegistry) -> Result<(), ConfigError> {
    for (_, set) in schema.definitions() {
        for constraint in set.matches() {
            if let ConstraintKind::Matches {
                datatype: Some(datatype),
                ..
            } = &constraint.kind
            {
                if !datatypes.contains(datatype) {
                    return Err(ConfigError::UnknownDatatype {
                        datatype: datatype.clone(),
                        constraint: constraint.display_id(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn warn_undeclared_indexes(schema: &Schema) {
    let declared: HashSet<&str> = schema
        .index_declarations()
        .filter_map(|(_, c)| match &c.kind {
            ConstraintKind::Index { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();

    for (definition, set) in schema.definitions() {
        for constraint in set.index_has_keys() {
            if let ConstraintKind::IndexHasKey { index_name, .. } = &constraint.kind {
                if !declared.contains(index_name.as_str()) {
                    warn!(
                        definition = %definition,
                        constraint = %constraint.display_id(),
                        index = %index_name,
                        "Constraint references an undeclared index"
                    );
                }
            }
        }
    }
}

fn evaluation_failed(
    tree: &dyn DocumentTree,
    constraint: &Constraint,
    node: NodeId,
    error: &EvaluationError,
) -> Finding {
    Finding::resolution(
        FindingKind::EvaluationFailed,
        constraint,
        node,
        format!("{} at {}: {}", constraint, tree.display_path(node), error),
    )
}

fn key_failure(
    tree: &dyn DocumentTree,
    constraint: &Constraint,
    node: NodeId,
    error: &KeyResolutionError,
) -> Finding {
    Finding::resolution(
        error.finding_kind(),
        constraint,
        node,
        format!("{} at {}: {}", constraint, tree.display_path(node), error),
    )
}

/// Run `work` over contiguous chunks of `nodes`, one scoped thread per chunk.
///
/// Results are returned in chunk order.
fn run_chunked<T, F>(nodes: &[NodeId], workers: usize, work: F) -> Vec<T>
where
    T: Send,
    F: Fn(&[NodeId]) -> T + Sync,
{
    if workers <= 1 || nodes.len() < 2 {
        return vec![work(nodes)];
    }

    let chunk_size = nodes.len().div_ceil(workers);
    let work = &work;
    thread::scope(|scope| {
        let handles: Vec<_> = nodes
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || work(chunk)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(payload) => panic::resume_unwind(payload),
            })
            .collect()
    })
}
