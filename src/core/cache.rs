/*!

The specialization cache memoizes synthesized plans by (operator, hierarchy, permutation
options), so repeated operator construction (and in particular the inference-deferred
operators, which consult the cache on every call) never re-synthesizes for a shape it
has already seen.

Cache hits share a previously built, immutable plan behind an `Arc`; only the
insert-on-miss path takes the write lock, and it re-checks under the lock so a lost
synthesis race returns the winner's plan.

*/

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::trace;

use crate::abstractions::HashMap;
use crate::api::hierarchy::Hierarchy;
use crate::core::plan::{Plan, TransformPlan};
use crate::core::shape_error::ShapeError;

/// The operator a plan was synthesized for.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) enum Operator {
  Isa,
  Map,
  Visit,
  Flatten,
  Lift,
  Transform,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct CacheKey {
  op  : Operator,
  hier: Hierarchy,
  perm: Option<Box<[usize]>>,
}

#[derive(Clone)]
enum CachedPlan {
  Traverse(Arc<Plan>),
  Transform(Arc<TransformPlan>),
}

static PLAN_CACHE: Lazy<RwLock<HashMap<CacheKey, CachedPlan>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn obtain<F>(key: CacheKey, synthesize: F) -> Result<CachedPlan, ShapeError>
where
  F: FnOnce() -> Result<CachedPlan, ShapeError>,
{
  {
    let cache = PLAN_CACHE.read().expect("plan cache poisoned");
    if let Some(plan) = cache.get(&key) {
      trace!("plan cache hit for {:?} on {}", key.op, key.hier);
      return Ok(plan.clone());
    }
  }

  let plan = synthesize()?;

  let mut cache = PLAN_CACHE.write().expect("plan cache poisoned");
  // Another thread may have synthesized the same plan while we were; keep the winner.
  let entry = cache.entry(key).or_insert(plan);
  Ok(entry.clone())
}

/// The shared traversal plan for an operator over a determined hierarchy.
pub(crate) fn traverse_plan(op: Operator, hier: &Hierarchy) -> Result<Arc<Plan>, ShapeError> {
  let key = CacheKey { op, hier: hier.clone(), perm: None };
  let plan = obtain(key, || Ok(CachedPlan::Traverse(Arc::new(Plan::new(hier)?))))?;
  match plan {
    CachedPlan::Traverse(plan) => Ok(plan),
    CachedPlan::Transform(_)   => unreachable!("traversal key resolved to a transform plan"),
  }
}

/// The shared transform plan for a hierarchy and a normalized permutation.
pub(crate) fn transform_plan(
  hier: &Hierarchy,
  perm: &[usize],
) -> Result<Arc<TransformPlan>, ShapeError> {
  let key = CacheKey {
    op  : Operator::Transform,
    hier: hier.clone(),
    perm: Some(perm.into()),
  };
  let plan = obtain(key, || {
    Ok(CachedPlan::Transform(Arc::new(TransformPlan::new(hier, perm)?)))
  })?;
  match plan {
    CachedPlan::Transform(plan) => Ok(plan),
    CachedPlan::Traverse(_)     => unreachable!("transform key resolved to a traversal plan"),
  }
}
