// src/plan/executor.rs

//! Background plan execution
//!
//! Plans submitted here run on the tokio blocking pool. Their progress can
//! be polled through task snapshots while they run.

use super::{ExecutionPlan, PackageTask};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

struct Submitted {
    plan: ExecutionPlan,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Submitted {
    fn is_finished(&self) -> bool {
        // a taken handle means a waiter owns the join; fall back to the plan
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => self.plan.is_executed(),
        }
    }
}

/// Runs execution plans in the background
pub struct PlanExecutor {
    runtime: Handle,
    order: Mutex<Vec<String>>,
    plans: Mutex<HashMap<String, Submitted>>,
}

impl PlanExecutor {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            order: Mutex::new(Vec::new()),
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Executor bound to the runtime of the calling context
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Package(format!("no tokio runtime available: {e}")))?;
        Ok(Self::new(runtime))
    }

    /// Start executing `plan`; returns its id
    pub fn submit(&self, plan: ExecutionPlan) -> String {
        let id = plan.id().to_string();
        let worker = plan.clone();
        let plan_id = id.clone();
        let handle = self.runtime.spawn_blocking(move || {
            let result = worker.execute();
            if let Err(e) = &result {
                error!("Plan {} could not run: {}", plan_id, e);
            }
            result
        });
        debug!("Submitted plan {}", id);

        self.plans.lock().insert(
            id.clone(),
            Submitted {
                plan,
                handle: Some(handle),
            },
        );
        self.order.lock().push(id.clone());
        id
    }

    /// Ids of submitted plans, oldest first
    pub fn plans(&self) -> Vec<String> {
        self.order.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<ExecutionPlan> {
        self.plans.lock().get(id).map(|s| s.plan.clone())
    }

    /// Current task states of a submitted plan
    pub fn snapshot(&self, id: &str) -> Option<Vec<PackageTask>> {
        self.get(id).map(|plan| plan.tasks())
    }

    pub fn is_finished(&self, id: &str) -> bool {
        self.plans.lock().get(id).is_some_and(Submitted::is_finished)
    }

    /// Drop a finished plan from the executor, returning it
    ///
    /// Plans still running are kept and `None` is returned.
    pub fn forget(&self, id: &str) -> Option<ExecutionPlan> {
        let mut plans = self.plans.lock();
        if !plans.get(id).is_some_and(Submitted::is_finished) {
            return None;
        }
        let submitted = plans.remove(id)?;
        self.order.lock().retain(|p| p != id);
        debug!("Forgot plan {}", id);
        Some(submitted.plan)
    }

    /// Drop every finished plan; returns the ids dropped, oldest first
    pub fn prune_finished(&self) -> Vec<String> {
        let mut plans = self.plans.lock();
        let mut order = self.order.lock();
        let mut pruned = Vec::new();
        order.retain(|id| {
            let finished = plans.get(id.as_str()).is_some_and(Submitted::is_finished);
            if finished {
                plans.remove(id.as_str());
                pruned.push(id.clone());
            }
            !finished
        });
        if !pruned.is_empty() {
            debug!("Pruned {} finished plan(s)", pruned.len());
        }
        pruned
    }

    /// Wait for a submitted plan to complete
    ///
    /// Only the first caller observes the plan's own result; later calls
    /// return immediately.
    pub async fn wait(&self, id: &str) -> Result<()> {
        let handle = {
            let mut plans = self.plans.lock();
            let submitted = plans
                .get_mut(id)
                .ok_or_else(|| Error::Package(format!("no submitted plan with id {id}")))?;
            submitted.handle.take()
        };

        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| Error::Package(format!("plan {id} worker failed: {e}")))?,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::PackageId;
    use crate::plan::{TaskState, TaskType};
    use crate::registry::PackageRegistry;
    use std::sync::Arc;

    fn plan() -> ExecutionPlan {
        let registry = Arc::new(PackageRegistry::in_memory().unwrap());
        registry
            .register("[package]\ngroup = \"g\"\nname = \"a\"\nversion = \"1.0\"\n".as_bytes(), false)
            .unwrap();
        registry
            .create_execution_plan()
            .task(PackageId::parse("g:a:1.0").unwrap(), TaskType::Remove)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let executor = PlanExecutor::current().unwrap();
        let plan = plan();
        let id = executor.submit(plan.clone());

        assert_eq!(executor.plans(), vec![id.clone()]);
        executor.wait(&id).await.unwrap();
        assert!(executor.is_finished(&id));
        assert!(plan.is_executed());

        let tasks = executor.snapshot(&id).unwrap();
        assert_eq!(tasks[0].state(), TaskState::Finished);
        assert!(!plan.registry().contains(tasks[0].id()).unwrap());

        // Second wait has nothing left to join
        executor.wait(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_forget_and_prune() {
        let executor = PlanExecutor::current().unwrap();
        let first = executor.submit(plan());
        let second = executor.submit(plan());
        executor.wait(&first).await.unwrap();

        let forgotten = executor.forget(&first).unwrap();
        assert!(forgotten.is_executed());
        assert!(executor.get(&first).is_none());
        assert_eq!(executor.plans(), vec![second.clone()]);
        assert!(executor.forget(&first).is_none());

        executor.wait(&second).await.unwrap();
        assert_eq!(executor.prune_finished(), vec![second]);
        assert!(executor.plans().is_empty());
        assert!(executor.prune_finished().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_plan() {
        let executor = PlanExecutor::current().unwrap();
        assert!(executor.wait("missing").await.is_err());
        assert!(executor.snapshot("missing").is_none());
        assert!(!executor.is_finished("missing"));
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(PlanExecutor::current().is_err());
    }
}
