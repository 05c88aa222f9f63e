//! Inter-task messages.
//!
//! Messages are plain `Copy` values: a sender copies one into the receiver's
//! mailbox and nothing is shared afterwards.

use crate::task::TaskId;

/// Bytes available in a [`Label`], terminator included.
pub const LABEL_CAPACITY: usize = 10;

/// Short fixed-size description attached to timers and timeout messages.
///
/// Holds at most `LABEL_CAPACITY - 1` bytes; longer input is cut on a char
/// boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Label {
    bytes: [u8; LABEL_CAPACITY],
    len: u8,
}

impl Label {
    pub const EMPTY: Label = Label {
        bytes: [0; LABEL_CAPACITY],
        len: 0,
    };

    pub fn new(text: &str) -> Self {
        let mut len = text.len().min(LABEL_CAPACITY - 1);
        while !text.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0; LABEL_CAPACITY];
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        Label {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl From<&str> for Label {
    fn from(text: &str) -> Self {
        Label::new(text)
    }
}

impl core::fmt::Debug for Label {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl core::fmt::Display for Label {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Keyboard modifiers (bitflags) ──────────────────────────────

bitflags::bitflags! {
    /// Modifier keys held when a key event was generated.
    ///
    /// Bit layout follows the USB HID boot keyboard modifier byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const LEFT_CONTROL  = 0b0000_0001;
        const LEFT_SHIFT    = 0b0000_0010;
        const LEFT_ALT      = 0b0000_0100;
        const LEFT_GUI      = 0b0000_1000;
        const RIGHT_CONTROL = 0b0001_0000;
        const RIGHT_SHIFT   = 0b0010_0000;
        const RIGHT_ALT     = 0b0100_0000;
        const RIGHT_GUI     = 0b1000_0000;

        const SHIFT   = Self::LEFT_SHIFT.bits() | Self::RIGHT_SHIFT.bits();
        const CONTROL = Self::LEFT_CONTROL.bits() | Self::RIGHT_CONTROL.bits();
    }
}

// ─── Layer operations ───────────────────────────────────────────

/// Request to the compositor owning a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerOperation {
    Move { x: i32, y: i32 },
    MoveRelative { dx: i32, dy: i32 },
    Draw,
    DrawArea { x: i32, y: i32, w: i32, h: i32 },
}

// ─── Message ────────────────────────────────────────────────────

/// Payload of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A device raised an interrupt on `vector`.
    DeviceInterrupt { vector: u8 },
    /// A one-shot timer expired.
    TimerTimeout {
        timeout: u64,
        value: i32,
        description: Label,
    },
    KeyPush {
        modifier: Modifiers,
        keycode: u8,
        ascii: u8,
        press: bool,
    },
    Layer {
        layer_id: u32,
        op: LayerOperation,
    },
    /// The compositor finished a `Layer` request.
    LayerFinish,
    MouseMove {
        x: i32,
        y: i32,
        dx: i32,
        dy: i32,
        buttons: u8,
    },
    MouseButton {
        x: i32,
        y: i32,
        press: bool,
        button: u8,
    },
}

/// A message plus the id of the task that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Sender, or [`TaskId::KERNEL`] for interrupt handlers and the kernel.
    pub src_task: TaskId,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(kind: MessageKind) -> Self {
        Message {
            src_task: TaskId::KERNEL,
            kind,
        }
    }

    /// Builder: set the sending task.
    pub fn from_task(mut self, src: TaskId) -> Self {
        self.src_task = src;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_truncates_to_capacity() {
        let label = Label::new("blink-cursor");
        assert_eq!(label.as_str(), "blink-cur");
        assert_eq!(Label::new("").as_str(), "");
    }

    #[test]
    fn label_cuts_on_char_boundary() {
        // 'é' is two bytes; the ninth byte would split it.
        let label = Label::new("abcdefghé");
        assert_eq!(label.as_str(), "abcdefgh");
    }

    #[test]
    fn kernel_is_default_sender() {
        let msg = Message::new(MessageKind::LayerFinish);
        assert_eq!(msg.src_task, TaskId::KERNEL);
        assert_eq!(msg.from_task(TaskId::from(4)).src_task.raw(), 4);
    }
}
