//! Spawner — bounded, concurrent registry of SubAgents; the 25%-of-budget
//! multi-agent layer on top of `loop-agent`'s single-session Executor.

pub mod naming;
pub mod persona;
pub mod specialist;
pub mod spawner;
pub mod subagent;

pub use naming::{make_id, purpose_hash_name};
pub use persona::{determine_agent_type, resolve_persona};
pub use specialist::{load_specialist, SpecialistFile};
pub use spawner::{Spawner, SpawnerConfig};
pub use subagent::{SubAgent, SubAgentMetrics, SubAgentState};
