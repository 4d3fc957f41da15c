//! Graph builder: declares stages and edges ahead of compilation.

use crate::errors::{CompileError, ConstructionError};
use crate::executor::CompiledPlan;
use crate::stage::Stage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The reserved terminal sentinel marking pipeline completion.
///
/// `END` is a routing target, never a real stage; an edge into `END` means
/// the pipeline is finished once its source stage completes.
pub const END: &str = "__end__";

/// Builder for declaring a stage graph.
///
/// Stages, edges, and the entry point may be declared in any order; no
/// well-formedness checks happen until [`compile`](Self::compile), so a
/// builder can be assembled incrementally. Only mistakes that are local to a
/// single call (re-registering a name, designating an unregistered entry) are
/// rejected immediately.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    name: String,
    stages: HashMap<String, Arc<dyn Stage>>,
    order: Vec<String>,
    edges: Vec<(String, String)>,
    entry: Option<String>,
}

impl GraphBuilder {
    /// Creates a new builder for a named pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            entry: None,
        }
    }

    /// Registers a stage under a unique name.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::DuplicateStage`] if the name is taken.
    pub fn register_stage(
        mut self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
    ) -> Result<Self, ConstructionError> {
        let name = name.into();
        if self.stages.contains_key(&name) {
            return Err(ConstructionError::duplicate(name));
        }
        self.order.push(name.clone());
        self.stages.insert(name, runner);
        Ok(self)
    }

    /// Records a directed edge.
    ///
    /// `to` may be the [`END`] sentinel. Endpoints are not checked here;
    /// dangling references are reported at compile time so edges can be
    /// declared before the stages they connect.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Designates the unique entry stage.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnknownStage`] if the name was never
    /// registered.
    pub fn set_entry(mut self, name: impl Into<String>) -> Result<Self, ConstructionError> {
        let name = name.into();
        if !self.stages.contains_key(&name) {
            return Err(ConstructionError::unknown(name));
        }
        self.entry = Some(name);
        Ok(self)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates the declarations and freezes them into an executable plan.
    ///
    /// Compilation is deterministic and side-effect-free: the same builder
    /// state always yields the same plan or the same error.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] when no entry is designated, an edge
    /// references an unregistered stage, a stage has more than one outgoing
    /// edge, a stage is revisited before [`END`], or the walk from the entry
    /// stalls before reaching [`END`].
    pub fn compile(self) -> Result<CompiledPlan, CompileError> {
        let entry = self.entry.clone().ok_or_else(|| CompileError::MissingEntry {
            pipeline: self.name.clone(),
        })?;

        // Every edge endpoint must exist; END is only valid as a target.
        let mut outgoing: HashMap<&str, &str> = HashMap::new();
        for (from, to) in &self.edges {
            let from_known = from != END && self.stages.contains_key(from);
            let to_known = to == END || self.stages.contains_key(to);
            if !from_known || !to_known {
                return Err(CompileError::DanglingEdge {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            if outgoing.insert(from.as_str(), to.as_str()).is_some() {
                return Err(CompileError::ConflictingEdges {
                    stage: from.clone(),
                });
            }
        }

        // Walk the chain from the entry until END. A revisit is a cycle; a
        // stage with no outgoing edge strands the walk short of END.
        let mut path: Vec<String> = Vec::new();
        let mut current = entry.as_str();
        loop {
            if let Some(pos) = path.iter().position(|seen| seen == current) {
                let mut cycle = path[pos..].to_vec();
                cycle.push(current.to_string());
                return Err(CompileError::Cycle { path: cycle });
            }
            path.push(current.to_string());

            match outgoing.get(current) {
                Some(&next) if next == END => break,
                Some(&next) => current = next,
                None => {
                    return Err(CompileError::UnreachableTerminal {
                        stalled_at: current.to_string(),
                    })
                }
            }
        }

        for name in &self.order {
            if !path.contains(name) {
                debug!(stage = %name, "stage registered but not reachable from entry; dropped from plan");
            }
        }

        let stages = path
            .iter()
            .map(|name| {
                let runner = Arc::clone(&self.stages[name]);
                (name.clone(), runner)
            })
            .collect();

        Ok(CompiledPlan::new(self.name, stages))
    }
}
