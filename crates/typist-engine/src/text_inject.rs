//! Keystroke injection.
//!
//! The engine decides what to type and when; a `KeystrokeInjector` performs
//! each keystroke. On Windows, `SendInputInjector` sends Unicode key events to
//! the focused application via `SendInput`. Elsewhere it reports an error.

use std::io::Write;
use std::sync::Mutex;

use typist_core::error::{Result, TypistError};

/// A single key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Backspace,
}

/// Performs keystrokes on behalf of a typing session.
///
/// An error moves the session to the Error state.
pub trait KeystrokeInjector: Send + Sync {
    fn send(&self, keystroke: Keystroke) -> Result<()>;
}

/// Types into the focused window through the OS input queue.
#[derive(Debug, Default)]
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "windows")]
impl KeystrokeInjector for SendInputInjector {
    fn send(&self, keystroke: Keystroke) -> Result<()> {
        use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
            SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
            KEYEVENTF_UNICODE, VK_BACK, VK_RETURN,
        };

        fn key_event(vk: u16, scan: u16, flags: u32) -> INPUT {
            INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: vk,
                        wScan: scan,
                        dwFlags: flags,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            }
        }

        let mut inputs: Vec<INPUT> = Vec::with_capacity(4);
        match keystroke {
            Keystroke::Backspace => {
                inputs.push(key_event(VK_BACK, 0, 0));
                inputs.push(key_event(VK_BACK, 0, KEYEVENTF_KEYUP));
            }
            Keystroke::Char('\r') => return Ok(()),
            Keystroke::Char('\n') => {
                inputs.push(key_event(VK_RETURN, 0, 0));
                inputs.push(key_event(VK_RETURN, 0, KEYEVENTF_KEYUP));
            }
            Keystroke::Char(ch) => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    inputs.push(key_event(0, *unit, KEYEVENTF_UNICODE));
                    inputs.push(key_event(0, *unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP));
                }
            }
        }

        let sent = unsafe {
            SendInput(
                inputs.len() as u32,
                inputs.as_ptr(),
                std::mem::size_of::<INPUT>() as i32,
            )
        };

        if sent as usize != inputs.len() {
            return Err(TypistError::Injection(format!(
                "SendInput only sent {} of {} events",
                sent,
                inputs.len()
            )));
        }
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
impl KeystrokeInjector for SendInputInjector {
    fn send(&self, _keystroke: Keystroke) -> Result<()> {
        tracing::warn!("SendInputInjector: SendInput not available on this platform");
        Err(TypistError::Injection(
            "Keystroke injection is only available on Windows".into(),
        ))
    }
}

/// Echoes keystrokes to stdout. Used for dry runs.
#[derive(Debug, Default)]
pub struct ConsoleInjector;

impl ConsoleInjector {
    pub fn new() -> Self {
        Self
    }
}

impl KeystrokeInjector for ConsoleInjector {
    fn send(&self, keystroke: Keystroke) -> Result<()> {
        let mut out = std::io::stdout().lock();
        match keystroke {
            Keystroke::Char(ch) => write!(out, "{}", ch),
            Keystroke::Backspace => write!(out, "\u{8} \u{8}"),
        }
        .and_then(|_| out.flush())
        .map_err(|e| TypistError::Injection(format!("stdout write failed: {}", e)))
    }
}

/// Records keystrokes in memory, optionally failing after a set count.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    keystrokes: Mutex<Vec<Keystroke>>,
    fail_after: Option<usize>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` keystrokes, then fail every following one.
    pub fn failing_after(count: usize) -> Self {
        Self {
            keystrokes: Mutex::new(Vec::new()),
            fail_after: Some(count),
        }
    }

    pub fn keystrokes(&self) -> Vec<Keystroke> {
        self.keystrokes
            .lock()
            .map(|k| k.clone())
            .unwrap_or_default()
    }

    pub fn backspaces(&self) -> usize {
        self.keystrokes()
            .iter()
            .filter(|k| **k == Keystroke::Backspace)
            .count()
    }

    /// The text a recipient would end up with.
    pub fn replay(&self) -> String {
        let mut text: Vec<char> = Vec::new();
        for keystroke in self.keystrokes() {
            match keystroke {
                Keystroke::Char(ch) => text.push(ch),
                Keystroke::Backspace => {
                    text.pop();
                }
            }
        }
        text.into_iter().collect()
    }
}

impl KeystrokeInjector for RecordingInjector {
    fn send(&self, keystroke: Keystroke) -> Result<()> {
        let mut keystrokes = self
            .keystrokes
            .lock()
            .map_err(|e| TypistError::Injection(format!("recorder lock poisoned: {}", e)))?;
        if self.fail_after.is_some_and(|limit| keystrokes.len() >= limit) {
            return Err(TypistError::Injection("target window went away".into()));
        }
        keystrokes.push(keystroke);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
