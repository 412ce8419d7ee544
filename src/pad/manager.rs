// Pad manager
// Merges local pads and relay sessions into one slot space for game logic

use super::keyboard::LocalPadSource;
use super::listeners::{ListenerId, Listeners};
use super::virtual_pad::VirtualPad;
use crate::config::PadConfig;
use crate::network::protocol::{DisplayOutbound, InputFrame, SessionId};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

struct RelayPad {
    pad: VirtualPad,
    // Consecutive ws_state frames this session was absent from
    missed: u32,
}

pub struct PadManager {
    config: PadConfig,
    sources: Vec<Box<dyn LocalPadSource>>,
    local_pads: BTreeMap<usize, VirtualPad>,
    relay_pads: BTreeMap<SessionId, RelayPad>,
    on_connect: Listeners<VirtualPad>,
    on_disconnect: Listeners<VirtualPad>,
}

impl PadManager {
    pub fn new(config: PadConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            local_pads: BTreeMap::new(),
            relay_pads: BTreeMap::new(),
            on_connect: Listeners::new(),
            on_disconnect: Listeners::new(),
        }
    }

    /// Slot a relay session is addressed by
    pub fn relay_slot(&self, id: SessionId) -> usize {
        self.config.relay_slot_offset + id.0 as usize
    }

    fn relay_id(&self, slot: usize) -> Option<SessionId> {
        let offset = slot.checked_sub(self.config.relay_slot_offset)?;
        u32::try_from(offset).ok().map(SessionId)
    }

    /// Attach a local device. Rejected if its slot is outside the local range.
    pub fn add_local_source(&mut self, source: Box<dyn LocalPadSource>) -> bool {
        if source.slot() >= self.config.local_slots {
            warn!(slot = source.slot(), "local pad slot out of range");
            return false;
        }
        self.sources.push(source);
        true
    }

    /// Sample every local device; plug and unplug fire the usual events
    pub fn poll_local(&mut self, now: Instant) {
        for source in self.sources.iter_mut() {
            let slot = source.slot();
            match source.poll(now) {
                Some(frame) => match self.local_pads.get_mut(&slot) {
                    Some(pad) => pad.apply(&frame),
                    None => {
                        let mut pad = VirtualPad::new(slot);
                        pad.apply(&frame);
                        self.on_connect.emit(&pad);
                        self.local_pads.insert(slot, pad);
                    }
                },
                None => {
                    if let Some(mut pad) = self.local_pads.remove(&slot) {
                        pad.connected = false;
                        self.on_disconnect.emit(&pad);
                    }
                }
            }
        }
    }

    /// Feed one relay message (WebSocket display or embedded host)
    pub fn handle_message(&mut self, msg: &DisplayOutbound) {
        match msg {
            DisplayOutbound::WsConnected { id } => {
                self.ensure_relay_pad(*id);
            }
            DisplayOutbound::WsDisconnected { id } => {
                self.drop_relay_pad(*id);
            }
            DisplayOutbound::WsState { controllers } => {
                for (id, frame) in controllers {
                    self.update_relay_pad(*id, frame);
                }

                let limit = self.config.missing_frames_before_disconnect.max(1);
                let mut gone = Vec::new();
                for (id, entry) in self.relay_pads.iter_mut() {
                    if controllers.contains_key(id) {
                        continue;
                    }
                    entry.missed += 1;
                    if entry.missed >= limit {
                        gone.push(*id);
                    }
                }
                for id in gone {
                    self.drop_relay_pad(id);
                }
            }
        }
    }

    /// Display link went away: every relay pad is gone with it
    pub fn clear_relay(&mut self) {
        let ids: Vec<_> = self.relay_pads.keys().copied().collect();
        for id in ids {
            self.drop_relay_pad(id);
        }
    }

    fn ensure_relay_pad(&mut self, id: SessionId) -> &mut RelayPad {
        let slot = self.relay_slot(id);
        let on_connect = &mut self.on_connect;
        self.relay_pads.entry(id).or_insert_with(|| {
            let pad = VirtualPad::new(slot);
            debug!(%id, slot, "relay pad connected");
            on_connect.emit(&pad);
            RelayPad { pad, missed: 0 }
        })
    }

    fn update_relay_pad(&mut self, id: SessionId, frame: &InputFrame) {
        let entry = self.ensure_relay_pad(id);
        entry.pad.apply(frame);
        entry.missed = 0;
    }

    fn drop_relay_pad(&mut self, id: SessionId) {
        if let Some(mut entry) = self.relay_pads.remove(&id) {
            entry.pad.connected = false;
            debug!(%id, slot = entry.pad.index, "relay pad disconnected");
            self.on_disconnect.emit(&entry.pad);
        }
    }

    /// Pad in `slot` if it is currently connected
    pub fn get_pad(&self, slot: usize) -> Option<&VirtualPad> {
        if slot < self.config.local_slots {
            return self.local_pads.get(&slot);
        }
        let id = self.relay_id(slot)?;
        self.relay_pads.get(&id).map(|entry| &entry.pad)
    }

    /// Snapshot of every connected pad, local first. Rebuilt on each call.
    pub fn get_all_connected_pads(&self) -> Vec<VirtualPad> {
        self.local_pads
            .values()
            .chain(self.relay_pads.values().map(|entry| &entry.pad))
            .filter(|pad| pad.connected)
            .cloned()
            .collect()
    }

    /// First connected pad, preferring local hardware
    pub fn get_any_pad(&self) -> Option<&VirtualPad> {
        self.local_pads
            .values()
            .next()
            .or_else(|| self.relay_pads.values().next().map(|entry| &entry.pad))
    }

    /// Slots of every connected relay session, ascending
    pub fn get_all_relay_slots(&self) -> Vec<usize> {
        self.relay_pads.values().map(|entry| entry.pad.index).collect()
    }

    pub fn relay_pad_count(&self) -> usize {
        self.relay_pads.len()
    }

    pub fn on_connect<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&VirtualPad) + Send + 'static,
    {
        self.on_connect.add(callback)
    }

    pub fn off_connect(&mut self, id: ListenerId) -> bool {
        self.on_connect.remove(id)
    }

    pub fn on_disconnect<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&VirtualPad) + Send + 'static,
    {
        self.on_disconnect.add(callback)
    }

    pub fn off_disconnect(&mut self, id: ListenerId) -> bool {
        self.on_disconnect.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::AggregatedFrame;
    use std::sync::{Arc, Mutex};

    fn manager() -> PadManager {
        PadManager::new(PadConfig::default())
    }

    fn state(entries: &[(u32, InputFrame)]) -> DisplayOutbound {
        let controllers: AggregatedFrame = entries
            .iter()
            .map(|(id, frame)| (SessionId(*id), *frame))
            .collect();
        DisplayOutbound::WsState { controllers }
    }

    fn record(manager: &mut PadManager) -> (Arc<Mutex<Vec<usize>>>, Arc<Mutex<Vec<(usize, bool)>>>) {
        let connects = Arc::new(Mutex::new(Vec::new()));
        let disconnects = Arc::new(Mutex::new(Vec::new()));
        let c = connects.clone();
        manager.on_connect(move |pad| c.lock().unwrap().push(pad.index));
        let d = disconnects.clone();
        manager.on_disconnect(move |pad| d.lock().unwrap().push((pad.index, pad.connected)));
        (connects, disconnects)
    }

    struct ScriptedSource {
        slot: usize,
        frames: Vec<Option<InputFrame>>,
    }

    impl LocalPadSource for ScriptedSource {
        fn slot(&self) -> usize {
            self.slot
        }

        fn poll(&mut self, _now: Instant) -> Option<InputFrame> {
            if self.frames.is_empty() {
                None
            } else {
                self.frames.remove(0)
            }
        }
    }

    #[test]
    fn test_first_appearance_creates_pad_at_offset_slot() {
        let mut manager = manager();
        let (connects, _) = record(&mut manager);
        let mut frame = InputFrame::neutral();
        frame.buttons[3] = true;

        manager.handle_message(&state(&[(2, frame)]));

        assert_eq!(*connects.lock().unwrap(), vec![102]);
        let pad = manager.get_pad(102).unwrap();
        assert!(pad.connected);
        assert!(pad.buttons[3].pressed);
        assert_eq!(pad.buttons[3].value, 1.0);
        assert!(manager.get_pad(103).is_none());
    }

    #[test]
    fn test_explicit_connect_fires_once() {
        let mut manager = manager();
        let (connects, _) = record(&mut manager);

        manager.handle_message(&DisplayOutbound::WsConnected { id: SessionId(0) });
        manager.handle_message(&state(&[(0, InputFrame::neutral())]));

        assert_eq!(*connects.lock().unwrap(), vec![100]);
    }

    #[test]
    fn test_absent_for_two_frames_disconnects() {
        let mut manager = manager();
        let (_, disconnects) = record(&mut manager);
        let neutral = InputFrame::neutral();

        manager.handle_message(&state(&[(0, neutral), (1, neutral)]));
        manager.handle_message(&state(&[(0, neutral)]));
        assert!(manager.get_pad(101).is_some());
        assert!(disconnects.lock().unwrap().is_empty());

        manager.handle_message(&state(&[(0, neutral)]));
        assert!(manager.get_pad(101).is_none());
        assert_eq!(*disconnects.lock().unwrap(), vec![(101, false)]);
    }

    #[test]
    fn test_reappearing_resets_missed_count() {
        let mut manager = manager();
        let neutral = InputFrame::neutral();
        manager.handle_message(&state(&[(0, neutral), (1, neutral)]));
        manager.handle_message(&state(&[(0, neutral)]));
        manager.handle_message(&state(&[(0, neutral), (1, neutral)]));
        manager.handle_message(&state(&[(0, neutral)]));
        assert!(manager.get_pad(101).is_some());
    }

    #[test]
    fn test_explicit_disconnect_removes_immediately() {
        let mut manager = manager();
        let (_, disconnects) = record(&mut manager);
        manager.handle_message(&state(&[(4, InputFrame::neutral())]));

        manager.handle_message(&DisplayOutbound::WsDisconnected { id: SessionId(4) });
        manager.handle_message(&DisplayOutbound::WsDisconnected { id: SessionId(4) });

        assert_eq!(*disconnects.lock().unwrap(), vec![(104, false)]);
        assert!(manager.get_all_relay_slots().is_empty());
    }

    #[test]
    fn test_local_and_relay_share_one_query_surface() {
        let mut manager = manager();
        let (connects, disconnects) = record(&mut manager);
        let mut pressed = InputFrame::neutral();
        pressed.buttons[0] = true;

        manager.add_local_source(Box::new(ScriptedSource {
            slot: 1,
            frames: vec![Some(pressed), None],
        }));
        manager.handle_message(&state(&[(0, InputFrame::neutral())]));
        assert!(manager.get_any_pad().is_some_and(|pad| pad.index == 100));

        manager.poll_local(Instant::now());
        let all: Vec<_> = manager.get_all_connected_pads().iter().map(|p| p.index).collect();
        assert_eq!(all, vec![1, 100]);
        assert!(manager.get_pad(1).unwrap().is_pressed(0));
        assert_eq!(manager.get_any_pad().unwrap().index, 1);

        // Unplugged on the next poll
        manager.poll_local(Instant::now());
        assert!(manager.get_pad(1).is_none());
        assert_eq!(*connects.lock().unwrap(), vec![100, 1]);
        assert_eq!(*disconnects.lock().unwrap(), vec![(1, false)]);
    }

    #[test]
    fn test_local_source_outside_range_rejected() {
        let mut manager = manager();
        assert!(!manager.add_local_source(Box::new(ScriptedSource {
            slot: 9,
            frames: Vec::new(),
        })));
    }

    #[test]
    fn test_off_connect_unregisters() {
        let mut manager = manager();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let id = manager.on_connect(move |_| *c.lock().unwrap() += 1);

        manager.handle_message(&DisplayOutbound::WsConnected { id: SessionId(0) });
        assert!(manager.off_connect(id));
        manager.handle_message(&DisplayOutbound::WsConnected { id: SessionId(1) });

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(manager.get_all_relay_slots(), vec![100, 101]);
    }

    #[test]
    fn test_clear_relay_disconnects_everyone() {
        let mut manager = manager();
        let (_, disconnects) = record(&mut manager);
        manager.handle_message(&state(&[(0, InputFrame::neutral()), (1, InputFrame::neutral())]));
        manager.clear_relay();
        assert_eq!(disconnects.lock().unwrap().len(), 2);
        assert_eq!(manager.relay_pad_count(), 0);
    }
}
