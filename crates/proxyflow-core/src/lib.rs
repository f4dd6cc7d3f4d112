//! proxyflow core
//!
//! Turns a declarative stack (a database proxy with its network placement,
//! credentials and grants) into a dependency-ordered provisioning document.

pub mod context;
pub mod emitter;
pub mod error;
pub mod graph;
pub mod loader;
pub mod lookup;
pub mod model;
pub mod onepassword;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod validator;

pub use context::StackContext;
pub use emitter::{Document, DocumentEntry, Lifecycle, OutputFormat, emit};
pub use error::{PlanError, Result};
pub use graph::{Graph, Plan, build_graph, topo_sort};
pub use loader::{LoadedStack, load_stack};
pub use lookup::{
    Attributes, ExternalLookup, LookupCache, LookupError, LookupRequest, NoLookup,
    pending_requests,
};
pub use model::*;
pub use parser::{parse_stack_file, parse_stack_str};
pub use planner::{CheckOutcome, PlanOutcome, check_stack, plan_stack};
pub use resolver::{DeferredBinding, ResolutionContext, Resolved, ResolvedValue};
pub use validator::{ValidationIssue, ValidationReport, ValidationWarning, validate};
