//! Planning pipeline
//!
//! descriptors → target groups → graph → validated graph → ordered plan → document.
//! Nothing is shared between runs; a failed run never yields a partial
//! document.

use crate::context::StackContext;
use crate::emitter::{Document, emit};
use crate::error::{PlanError, Result};
use crate::graph::{Plan, build_graph, topo_sort};
use crate::lookup::ExternalLookup;
use crate::model::Stack;
use crate::resolver::ResolutionContext;
use crate::validator::{ValidationReport, validate};
use tracing::{info, instrument};

/// Result of a successful plan computation
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub document: Document,
    /// Warnings only; issues abort the run
    pub report: ValidationReport,
}

/// Result of a check that stops before emission
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub plan: Plan,
    pub report: ValidationReport,
}

/// Run every stage up to validation
#[instrument(skip_all, fields(stack = %stack.name()))]
pub fn check_stack(
    stack: &Stack,
    config: &StackContext,
    lookups: &dyn ExternalLookup,
) -> Result<CheckOutcome> {
    let stack = stack.with_target_associations()?;
    let (plan, _ctx, report) = prepare(&stack, config, lookups)?;
    Ok(CheckOutcome { plan, report })
}

/// Compute the ordered, resolved document for a stack
#[instrument(skip_all, fields(stack = %stack.name()))]
pub fn plan_stack(
    stack: &Stack,
    config: &StackContext,
    lookups: &dyn ExternalLookup,
) -> Result<PlanOutcome> {
    let stack = stack.with_target_associations()?;
    let (plan, mut ctx, report) = prepare(&stack, config, lookups)?;
    let document = emit(&plan, &mut ctx)?;
    info!(
        resources = document.resources.len(),
        warnings = report.warnings.len(),
        "Plan computed"
    );
    Ok(PlanOutcome {
        plan,
        document,
        report,
    })
}

fn prepare<'a>(
    stack: &'a Stack,
    config: &'a StackContext,
    lookups: &'a dyn ExternalLookup,
) -> Result<(Plan, ResolutionContext<'a>, ValidationReport)> {
    config.require_all(stack)?;

    let graph = build_graph(stack)?;
    let plan = topo_sort(&graph)?;

    let mut ctx = ResolutionContext::new(stack, config, lookups);
    ctx.realize_external()?;

    let report = validate(&ctx);
    if !report.is_valid() {
        return Err(PlanError::Validation(report));
    }
    Ok((plan, ctx, report))
}
