//! Recipe document loader.
//!
//! Starting from the root file, every Step carrying a `StepRecipeID` is
//! resolved to a sibling document (`<id>.<child extension>`) and loaded once.
//! The traversal is an explicit worklist over a petgraph reference graph with
//! a visited set keyed by canonical path, so shared children are parsed a
//! single time and a back edge is reported as a cycle instead of recursing.

use crate::config::RunContext;
use crate::error::{BulkEditError, BulkEditResult};
use crate::tree::{Document, RecipeTree, Reference, Resolution};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Load the root document and everything it references.
///
/// # Errors
/// * `UnresolvedReference` if a referenced file does not exist
/// * `CyclicReference` if a document (transitively) references itself
/// * `DuplicateDocument` if two files share an identifier
/// * `Io` / `Xml` if a file cannot be read or parsed
pub fn load_tree(root: &Path, ctx: &RunContext) -> BulkEditResult<RecipeTree> {
    let mut tree = RecipeTree::new();
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut visited: HashMap<PathBuf, NodeIndex> = HashMap::new();
    let mut worklist: Vec<PathBuf> = Vec::new();
    let mut pending: Vec<(String, Reference)> = Vec::new();

    let root = std::fs::canonicalize(root)?;
    let document = read_document(&root)?;
    tracing::info!("Loaded {} from {}", document.id(), root.display());
    visited.insert(root.clone(), graph.add_node(document.id().to_string()));
    tree.add(document)?;
    worklist.push(root);

    while let Some(parent_path) = worklist.pop() {
        let parent_node = visited[&parent_path];
        let parent_id = graph[parent_node].clone();
        let Some(parent) = tree.get(&parent_id) else {
            continue;
        };
        let extension = parent_path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(child_extension) = ctx.config.child_extension(&extension) else {
            tracing::debug!("{} has no child document type; references not followed", parent_id);
            continue;
        };
        let dir = parent_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        for (step, target) in parent.step_references() {
            let resolution = match find_child_file(&dir, &target, child_extension) {
                None => Resolution::Missing(dir.join(format!("{}.{}", target, child_extension))),
                Some(candidate) => {
                    let candidate = std::fs::canonicalize(&candidate)?;
                    match visited.get(&candidate).copied() {
                        Some(child_node) => {
                            graph.update_edge(parent_node, child_node, ());
                            let child_id = graph[child_node].clone();
                            if has_path_connecting(&graph, child_node, parent_node, None) {
                                Resolution::Cycle(child_id)
                            } else {
                                Resolution::Resolved(child_id)
                            }
                        }
                        None => {
                            let document = read_document(&candidate)?;
                            tracing::debug!(
                                "{} references {} ({})",
                                parent_id,
                                document.id(),
                                candidate.display()
                            );
                            let child_id = document.id().to_string();
                            let child_node = graph.add_node(child_id.clone());
                            graph.add_edge(parent_node, child_node, ());
                            visited.insert(candidate.clone(), child_node);
                            tree.add(document)?;
                            worklist.push(candidate);
                            Resolution::Resolved(child_id)
                        }
                    }
                }
            };
            pending.push((
                parent_id.clone(),
                Reference {
                    step,
                    target,
                    resolution,
                },
            ));
        }
    }

    check_references(&tree, &graph, &visited, &pending)?;

    let mut by_document: HashMap<String, Vec<Reference>> = HashMap::new();
    for (owner, reference) in pending {
        by_document.entry(owner).or_default().push(reference);
    }
    for document in tree.documents_mut() {
        if let Some(references) = by_document.remove(document.id()) {
            document.set_references(references);
        }
    }

    tracing::info!("Loaded {} document(s)", tree.len());
    Ok(tree)
}

fn read_document(path: &Path) -> BulkEditResult<Document> {
    let bytes = std::fs::read(path)?;
    Document::parse(path, &bytes)
}

/// Candidate file for `target` next to its parent, trying the extension as
/// configured, then upper and lower case.
fn find_child_file(dir: &Path, target: &str, extension: &str) -> Option<PathBuf> {
    [
        extension.to_string(),
        extension.to_ascii_uppercase(),
        extension.to_ascii_lowercase(),
    ]
    .iter()
    .map(|ext| dir.join(format!("{}.{}", target, ext)))
    .find(|candidate| candidate.is_file())
}

/// Turn the first failed resolution into its fatal error.
fn check_references(
    tree: &RecipeTree,
    graph: &DiGraph<String, ()>,
    visited: &HashMap<PathBuf, NodeIndex>,
    pending: &[(String, Reference)],
) -> BulkEditResult<()> {
    for (owner, reference) in pending {
        if let Resolution::Missing(expected) = &reference.resolution {
            let parent = tree
                .get(owner)
                .map(|d| d.path().to_path_buf())
                .unwrap_or_default();
            return Err(BulkEditError::UnresolvedReference {
                parent,
                reference: reference.target.clone(),
                expected: expected.clone(),
            });
        }
    }

    if toposort(graph, None).is_err() {
        let index_of = |id: &str| {
            visited
                .values()
                .copied()
                .find(|n| graph[*n] == id)
        };
        for (owner, reference) in pending {
            if let Resolution::Cycle(child) = &reference.resolution {
                let cycle = match (index_of(owner), index_of(child)) {
                    (Some(from), Some(to)) => cycle_names(graph, from, to),
                    _ => vec![owner.clone(), child.clone()],
                };
                return Err(BulkEditError::CyclicReference { cycle });
            }
        }
    }
    Ok(())
}

/// Names along `from -> to -> ... -> from`, following a shortest path back.
fn cycle_names(graph: &DiGraph<String, ()>, from: NodeIndex, to: NodeIndex) -> Vec<String> {
    let mut names = vec![graph[from].clone()];
    if from == to {
        names.push(graph[from].clone());
        return names;
    }

    let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([to]);
    while let Some(node) = queue.pop_front() {
        if node == from {
            break;
        }
        for edge in graph.edges(node) {
            let next = edge.target();
            if next != to && !previous.contains_key(&next) {
                previous.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    let mut back = vec![from];
    let mut cursor = from;
    while let Some(&prev) = previous.get(&cursor) {
        back.push(prev);
        cursor = prev;
    }
    back.reverse();
    names.extend(back.into_iter().map(|n| graph[n].clone()));
    names
}
