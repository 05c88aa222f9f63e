//! PS/2 keyboard decoding into `KeyPush` messages.
//!
//! Scan codes (set 1) are decoded with `pc-keyboard`; modifier state is
//! tracked here from the raw key events so release events carry it too.

use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, KeyState, Keyboard, ScancodeSet1};

use crate::message::{Message, MessageKind, Modifiers};

pub struct KeyboardDecoder {
    keyboard: Keyboard<layouts::Us104Key, ScancodeSet1>,
    modifiers: Modifiers,
}

impl Default for KeyboardDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardDecoder {
    pub fn new() -> Self {
        KeyboardDecoder {
            keyboard: Keyboard::new(ScancodeSet1::new(), layouts::Us104Key, HandleControl::Ignore),
            modifiers: Modifiers::empty(),
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Feed one byte from the controller; returns a message once a whole key
    /// event has been received.
    pub fn on_scancode(&mut self, scancode: u8) -> Option<Message> {
        let event = self.keyboard.add_byte(scancode).ok()??;
        let code = event.code;
        let press = event.state == KeyState::Down;

        if let Some(flag) = modifier_flag(code) {
            self.modifiers.set(flag, press);
        }

        let ascii = match self.keyboard.process_keyevent(event) {
            Some(DecodedKey::Unicode(c)) if c.is_ascii() => c as u8,
            _ => 0,
        };

        Some(Message::new(MessageKind::KeyPush {
            modifier: self.modifiers,
            keycode: code as u8,
            ascii,
            press,
        }))
    }
}

fn modifier_flag(code: KeyCode) -> Option<Modifiers> {
    let flag = match code {
        KeyCode::LControl => Modifiers::LEFT_CONTROL,
        KeyCode::LShift => Modifiers::LEFT_SHIFT,
        KeyCode::LAlt => Modifiers::LEFT_ALT,
        KeyCode::LWin => Modifiers::LEFT_GUI,
        KeyCode::RControl => Modifiers::RIGHT_CONTROL,
        KeyCode::RShift => Modifiers::RIGHT_SHIFT,
        KeyCode::RAltGr => Modifiers::RIGHT_ALT,
        KeyCode::RWin => Modifiers::RIGHT_GUI,
        _ => return None,
    };
    Some(flag)
}
