//! Reference Kernel: a concurrent, in-memory fact store.
//!
//! The Kernel contract describes a logic-programming engine with
//! forward-chaining inference over a Datalog-style rule base, with only its
//! `Assert`/`Query`/`RetractFact` surface binding on callers. This
//! implementation is the minimal reference collaborator the Safety Gate
//! needs to be testable: facts are grouped by predicate in a concurrent
//! map, with no rule evaluation beyond exact storage and retrieval —
//! callers that want `permitted/3` facts to be *derived* from
//! `pending_action/5` facts must assert them directly.

use async_trait::async_trait;
use dashmap::DashMap;
use loop_core::{Error, Fact, Kernel, Result};
use tracing::warn;

#[derive(Default)]
pub struct InMemoryKernel {
    facts: DashMap<String, Vec<Fact>>,
}

impl InMemoryKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total fact count across all predicates. Test/diagnostic helper.
    pub fn len(&self) -> usize {
        self.facts.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Kernel for InMemoryKernel {
    async fn assert(&self, fact: Fact) -> Result<()> {
        self.facts.entry(fact.predicate.clone()).or_default().push(fact);
        Ok(())
    }

    async fn query(&self, predicate: &str) -> Result<Vec<Fact>> {
        Ok(self.facts.get(predicate).map(|v| v.clone()).unwrap_or_default())
    }

    async fn retract_fact(&self, fact: &Fact) -> Result<()> {
        let Some(mut bucket) = self.facts.get_mut(&fact.predicate) else {
            warn!(predicate = %fact.predicate, "retract of unknown predicate");
            return Ok(());
        };
        let before = bucket.len();
        bucket.retain(|f| f != fact);
        if bucket.len() == before {
            warn!(predicate = %fact.predicate, args = ?fact.args, "retract of absent fact");
        }
        Ok(())
    }
}

/// A Kernel that always errors — used to exercise the Safety Gate's
/// fail-closed behavior on a Kernel round-trip failure.
pub struct FailingKernel;

#[async_trait]
impl Kernel for FailingKernel {
    async fn assert(&self, _fact: Fact) -> Result<()> {
        Err(Error::internal("kernel unavailable"))
    }

    async fn query(&self, _predicate: &str) -> Result<Vec<Fact>> {
        Err(Error::internal("kernel unavailable"))
    }

    async fn retract_fact(&self, _fact: &Fact) -> Result<()> {
        Err(Error::internal("kernel unavailable"))
    }
}
