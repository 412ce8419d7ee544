// Session registry
// Live controller sessions and their most recent input frames

use crate::network::protocol::{AggregatedFrame, InputFrame, SessionId};
use std::collections::BTreeMap;

/// Map of live sessions to their latest frame.
///
/// Ids are allocated lowest-free-first, so a freed id is the next one
/// handed out. Each session owns exactly one frame slot, which is
/// overwritten on every update.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    frames: BTreeMap<SessionId, InputFrame>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lowest unused id and seed it with a neutral frame
    pub fn allocate(&mut self) -> SessionId {
        // Keys iterate in order: the first gap is the lowest free id
        let mut candidate = 0u32;
        for id in self.frames.keys() {
            if id.0 != candidate {
                break;
            }
            candidate += 1;
        }

        let id = SessionId(candidate);
        self.frames.insert(id, InputFrame::neutral());
        id
    }

    /// Forget a session. Releasing an unknown id is a no-op.
    pub fn release(&mut self, id: SessionId) -> bool {
        self.frames.remove(&id).is_some()
    }

    /// Replace the stored frame. Unknown ids are ignored.
    pub fn update(&mut self, id: SessionId, frame: InputFrame) -> bool {
        match self.frames.get_mut(&id) {
            Some(slot) => {
                *slot = frame;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.frames.contains_key(&id)
    }

    pub fn frame(&self, id: SessionId) -> Option<&InputFrame> {
        self.frames.get(&id)
    }

    /// Copy of every live session's latest frame
    pub fn snapshot(&self) -> AggregatedFrame {
        self.frames.clone()
    }

    /// Live ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.frames.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
