// Consumer-side input: virtual pads for game logic

pub mod keyboard;
pub mod listeners;
pub mod manager;
pub mod virtual_pad;

pub use keyboard::{read_key_presses, KeyboardPad, LocalPadSource};
pub use listeners::{ListenerId, Listeners};
pub use manager::PadManager;
pub use virtual_pad::{PadButton, VirtualPad};
