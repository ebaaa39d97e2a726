//! Constitutional Safety Gate — a transactional Kernel round-trip that
//! admits or denies one tool call.

use chrono::Utc;
use loop_core::{Fact, Kernel, NameAtom, ToolCall};
use std::sync::Arc;
use tracing::warn;

/// Fixed preference order for target extraction from a tool call's args.
const TARGET_KEYS: &[&str] = &["path", "file", "url", "query", "command"];
const UNKNOWN_TARGET: &str = "unknown";

pub struct SafetyGate {
    kernel: Arc<dyn Kernel>,
}

/// Retracts the asserted `pending_action` fact on drop unless `defuse` was
/// called first — the one available approximation in safe async Rust of
/// "retract on every exit path including panic": a `tokio::spawn` retract
/// runs even if the holder is dropped while unwinding.
struct RetractGuard {
    kernel: Arc<dyn Kernel>,
    fact: Option<Fact>,
}

impl RetractGuard {
    fn new(kernel: Arc<dyn Kernel>, fact: Fact) -> Self {
        Self { kernel, fact: Some(fact) }
    }

    async fn retract_now(mut self) {
        if let Some(fact) = self.fact.take() {
            if let Err(e) = self.kernel.retract_fact(&fact).await {
                warn!(error = %e, "pending_action retraction failed");
            }
        }
    }
}

impl Drop for RetractGuard {
    fn drop(&mut self) {
        if let Some(fact) = self.fact.take() {
            let kernel = self.kernel.clone();
            tokio::spawn(async move {
                if let Err(e) = kernel.retract_fact(&fact).await {
                    warn!(error = %e, "pending_action retraction failed on drop");
                }
            });
        }
    }
}

impl SafetyGate {
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self { kernel }
    }

    /// Canonicalize a tool call's target by the fixed preference order.
    fn extract_target(call: &ToolCall) -> String {
        for key in TARGET_KEYS {
            if let Some(v) = call.args.get(*key) {
                if let Some(s) = v.as_str() {
                    return s.to_string();
                }
                return v.to_string();
            }
        }
        UNKNOWN_TARGET.to_string()
    }

    /// Deterministic JSON serialization of args — `BTreeMap` already
    /// iterates in sorted key order so the default `serde_json` encoding is
    /// canonical here without extra sorting.
    fn canonical_payload(call: &ToolCall) -> Option<String> {
        serde_json::to_string(&call.args).ok()
    }

    /// Fail-closed when enabled: a query error, an assertion error, or an
    /// unserializable payload all deny. When the gate is disabled the call
    /// is always admitted — callers should check `enabled` upstream to skip
    /// invoking this at all, but `check` honors it too for safety.
    pub async fn check(&self, call: &ToolCall, enabled: bool) -> bool {
        if !enabled {
            return true;
        }

        let action_type = NameAtom::new(&call.name);
        let target = Self::extract_target(call);
        let Some(payload) = Self::canonical_payload(call) else {
            warn!(tool = %call.name, "safety gate deny: payload not serializable");
            return false;
        };

        let fact = Fact::new(
            "pending_action",
            vec![call.id.clone(), action_type.to_string(), target.clone(), payload.clone(), Utc::now().to_rfc3339()],
        );

        if let Err(e) = self.kernel.assert(fact.clone()).await {
            warn!(tool = %call.name, error = %e, "safety gate deny: assert failed");
            return false;
        }

        let guard = RetractGuard::new(self.kernel.clone(), fact);

        let permitted = match self.kernel.query("permitted").await {
            Ok(facts) => facts.iter().any(|f| {
                f.args.len() == 3 && f.args[0] == action_type.to_string() && f.args[1] == target && f.args[2] == payload
            }),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "safety gate deny: query failed");
                false
            }
        };

        guard.retract_now().await;
        permitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loop_kernel::{FailingKernel, InMemoryKernel};
    use std::collections::BTreeMap;

    fn call(name: &str, path: &str) -> ToolCall {
        let mut args = BTreeMap::new();
        args.insert("path".to_string(), serde_json::json!(path));
        ToolCall { id: "call-1".to_string(), name: name.to_string(), args }
    }

    #[tokio::test]
    async fn denies_by_default_on_empty_kernel() {
        let kernel = Arc::new(InMemoryKernel::new());
        let gate = SafetyGate::new(kernel.clone());
        let admitted = gate.check(&call("readFile", "secret.txt"), true).await;
        assert!(!admitted);
        assert!(kernel.is_empty(), "pending_action must be retracted");
    }

    #[tokio::test]
    async fn admits_on_explicit_permission() {
        let kernel = Arc::new(InMemoryKernel::new());
        let payload = SafetyGate::canonical_payload(&call("readFile", "secret.txt")).unwrap();
        kernel
            .assert(Fact::new("permitted", vec!["/readFile".into(), "secret.txt".into(), payload]))
            .await
            .unwrap();

        let gate = SafetyGate::new(kernel.clone());
        let admitted = gate.check(&call("readFile", "secret.txt"), true).await;
        assert!(admitted);
    }

    #[tokio::test]
    async fn denies_on_target_mismatch() {
        let kernel = Arc::new(InMemoryKernel::new());
        let payload = SafetyGate::canonical_payload(&call("readFile", "secret.txt")).unwrap();
        kernel
            .assert(Fact::new("permitted", vec!["/readFile".into(), "other.txt".into(), payload]))
            .await
            .unwrap();

        let gate = SafetyGate::new(kernel.clone());
        let admitted = gate.check(&call("readFile", "secret.txt"), true).await;
        assert!(!admitted);
    }

    #[tokio::test]
    async fn disabled_gate_always_admits() {
        let kernel = Arc::new(InMemoryKernel::new());
        let gate = SafetyGate::new(kernel);
        assert!(gate.check(&call("readFile", "secret.txt"), false).await);
    }

    #[tokio::test]
    async fn kernel_error_fails_closed() {
        let gate = SafetyGate::new(Arc::new(FailingKernel));
        assert!(!gate.check(&call("readFile", "secret.txt"), true).await);
    }

    #[test]
    fn target_falls_back_to_unknown() {
        let call = ToolCall { id: "1".into(), name: "noop".into(), args: BTreeMap::new() };
        assert_eq!(SafetyGate::extract_target(&call), "unknown");
    }
}
