//! Canvas stroke buffer: append/list/clear per room.
//!
//! Strokes are opaque JSON blobs — the engine only replays them to
//! reconnecting players and wipes them at round start.

use std::collections::HashMap;
use std::sync::Mutex;

use scrawl_protocol::RoomCode;

/// Stroke replay storage for reconnects.
pub trait CanvasStore: Send + Sync + 'static {
    fn append_stroke(&self, room: &RoomCode, stroke: serde_json::Value);
    fn strokes(&self, room: &RoomCode) -> Vec<serde_json::Value>;
    fn clear(&self, room: &RoomCode);
}

/// In-memory [`CanvasStore`].
#[derive(Default)]
pub struct MemoryCanvas {
    strokes: Mutex<HashMap<RoomCode, Vec<serde_json::Value>>>,
}

impl MemoryCanvas {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CanvasStore for MemoryCanvas {
    fn append_stroke(&self, room: &RoomCode, stroke: serde_json::Value) {
        self.strokes
            .lock()
            .expect("canvas lock poisoned")
            .entry(room.clone())
            .or_default()
            .push(stroke);
    }

    fn strokes(&self, room: &RoomCode) -> Vec<serde_json::Value> {
        self.strokes
            .lock()
            .expect("canvas lock poisoned")
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    fn clear(&self, room: &RoomCode) {
        self.strokes
            .lock()
            .expect("canvas lock poisoned")
            .remove(room);
    }
}
