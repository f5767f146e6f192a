//! In-process change-notification hub for block mutations. Editor sessions
//! and the SSE route subscribe here; the block store publishes after every
//! committed write.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio::sync::broadcast;
use ts_rs::TS;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeOp {
    Replaced,
    Upserted,
    Deleted,
}

/// One committed mutation of a page's block list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct BlockChange {
    pub page_path: String,
    pub op: ChangeOp,
    pub block_id: Option<Uuid>,
    /// Page version after the mutation.
    pub version: i64,
}

#[derive(Clone)]
pub struct PageEvents {
    tx: broadcast::Sender<BlockChange>,
}

impl Default for PageEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl PageEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockChange> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers. A hub with no subscribers is not
    /// an error.
    pub fn publish(&self, change: BlockChange) {
        let receivers = self.tx.send(change.clone()).unwrap_or(0);
        tracing::debug!(
            page_path = %change.page_path,
            op = %change.op,
            version = change.version,
            receivers,
            "block change published"
        );
    }
}
