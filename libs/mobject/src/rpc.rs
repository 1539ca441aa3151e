//! Request messages understood by a provider.

use serde::{Deserialize, Serialize};

use crate::id::SequencerId;

/// One inbound call, tagged by operation name.
///
/// Admin operations carry the caller's token; an absent token deserializes
/// as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcRequest {
    CreateSequencer {
        #[serde(default)]
        token: String,
        sequencer_type: String,
        config: String,
    },
    OpenSequencer {
        #[serde(default)]
        token: String,
        sequencer_type: String,
        config: String,
    },
    CloseSequencer {
        #[serde(default)]
        token: String,
        sequencer_id: SequencerId,
    },
    DestroySequencer {
        #[serde(default)]
        token: String,
        sequencer_id: SequencerId,
    },
    CheckSequencer {
        sequencer_id: SequencerId,
    },
    SayHello {
        sequencer_id: SequencerId,
    },
    ComputeSum {
        sequencer_id: SequencerId,
        x: i32,
        y: i32,
    },
}

impl RpcRequest {
    /// Wire name of the operation.
    pub fn op(&self) -> &'static str {
        match self {
            Self::CreateSequencer { .. } => "create_sequencer",
            Self::OpenSequencer { .. } => "open_sequencer",
            Self::CloseSequencer { .. } => "close_sequencer",
            Self::DestroySequencer { .. } => "destroy_sequencer",
            Self::CheckSequencer { .. } => "check_sequencer",
            Self::SayHello { .. } => "say_hello",
            Self::ComputeSum { .. } => "compute_sum",
        }
    }
}
