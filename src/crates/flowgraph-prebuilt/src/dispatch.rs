//! The dispatch workflow
//!
//! Two steps: run the dependency resolver (plan lands in context), then
//! emit the matrix artifacts. Failures in either node terminate the run
//! through the engine's normal ERROR path.

use std::sync::Arc;

use flowgraph_core::{Transition, WorkflowConfig};
use flowgraph_dispatch::nodes::{DispatchNode, MatrixEmitNode};
use flowgraph_dispatch::DispatchResolver;

/// Build the dispatch [`WorkflowConfig`] over a configured resolver.
pub fn dispatch_workflow(resolver: Arc<DispatchResolver>) -> WorkflowConfig {
    let config = resolver.config();
    let output_file = config.output_file.clone();
    let dry_run = config.dry_run;

    WorkflowConfig::new("dispatch")
        .with_node(Arc::new(DispatchNode::new(
            "RESOLVE",
            Arc::clone(&resolver),
            Transition::to("EMIT_MATRIX"),
        )))
        .with_node(Arc::new(MatrixEmitNode::new(
            "EMIT_MATRIX",
            output_file,
            dry_run,
            Transition::end(),
        )))
}
