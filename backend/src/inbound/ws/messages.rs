//! Outbound WebSocket payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::VoteUpdate;

/// Text frame sent for every committed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteUpdateMessage {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub new_count: u32,
}

impl From<VoteUpdate> for VoteUpdateMessage {
    fn from(update: VoteUpdate) -> Self {
        Self {
            poll_id: *update.poll_id.as_uuid(),
            option_id: *update.option_id.as_uuid(),
            new_count: update.new_count,
        }
    }
}
