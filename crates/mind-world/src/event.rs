//! Observable things that happened during a tick.

use crate::agent::DeathCause;
use mind_core::{AgentId, Position, RunTotals, Species};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TickEvent {
    Born {
        id: AgentId,
        parent: AgentId,
        species: Species,
        position: Position,
        /// Inherited parameters were perturbed at birth
        mutated: bool,
    },
    Died {
        id: AgentId,
        position: Position,
        cause: DeathCause,
    },
    Respawned {
        id: AgentId,
        position: Position,
        cause: DeathCause,
    },
    Consumed {
        id: AgentId,
        position: Position,
    },
    Mutated {
        id: AgentId,
        habituation_rate: f32,
        inhibition: f32,
    },
}

impl TickEvent {
    pub fn agent(&self) -> AgentId {
        match self {
            TickEvent::Born { id, .. }
            | TickEvent::Died { id, .. }
            | TickEvent::Respawned { id, .. }
            | TickEvent::Consumed { id, .. }
            | TickEvent::Mutated { id, .. } => *id,
        }
    }

    /// Fold this event into the run counters
    pub fn tally(&self, totals: &mut RunTotals) {
        match self {
            TickEvent::Born { .. } => totals.births += 1,
            TickEvent::Died { .. } => totals.deaths += 1,
            TickEvent::Respawned { .. } => totals.respawns += 1,
            TickEvent::Consumed { .. } => totals.resources_consumed += 1,
            TickEvent::Mutated { .. } => totals.mutations += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = TickEvent::Died {
            id: AgentId(4),
            position: Position::new(1, 2),
            cause: DeathCause::Starvation,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "died");
        assert_eq!(json["cause"], "starvation");
        assert_eq!(event.agent(), AgentId(4));
    }

    #[test]
    fn test_tally() {
        let mut totals = RunTotals::default();
        let events = [
            TickEvent::Consumed {
                id: AgentId(1),
                position: Position::new(0, 0),
            },
            TickEvent::Consumed {
                id: AgentId(2),
                position: Position::new(1, 0),
            },
            TickEvent::Respawned {
                id: AgentId(3),
                position: Position::new(2, 0),
                cause: DeathCause::OldAge,
            },
        ];
        for event in &events {
            event.tally(&mut totals);
        }
        assert_eq!(totals.resources_consumed, 2);
        assert_eq!(totals.respawns, 1);
        assert_eq!(totals.births, 0);
    }
}
