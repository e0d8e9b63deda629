//! Win32 input backend (`EnumWindows` + `SetForegroundWindow` + `SendInput`).

use super::backend::{title_matches, InputBackend, WindowHandle};
use crate::error::BackendError;
use crate::keys::KeyCode;
use std::mem;
use tracing::debug;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, VIRTUAL_KEY, VK_DOWN, VK_END, VK_F1, VK_HOME,
    VK_NEXT, VK_PRIOR, VK_RETURN, VK_SPACE, VK_TAB, VK_UP,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextW, IsIconic, IsWindowVisible, SetForegroundWindow, ShowWindow,
    SW_RESTORE,
};

#[derive(Debug, Default)]
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InputBackend for WindowsBackend {
    fn name(&self) -> &'static str {
        "win32"
    }

    fn find_window(&mut self, candidates: &[String]) -> Result<Option<WindowHandle>, BackendError> {
        let mut hwnds: Vec<isize> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut hwnds as *mut Vec<isize> as isize),
            )
            .map_err(|e| BackendError::Os(format!("EnumWindows: {}", e)))?;
        }

        for raw in hwnds {
            let hwnd = HWND(raw as *mut _);
            if !unsafe { IsWindowVisible(hwnd) }.as_bool() {
                continue;
            }
            let mut buf = [0u16; 512];
            let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
            if len <= 0 {
                continue;
            }
            let title = String::from_utf16_lossy(&buf[..len as usize]);
            if title_matches(&title, candidates) {
                return Ok(Some(WindowHandle { raw, title }));
            }
        }
        Ok(None)
    }

    fn focus_window(&mut self, window: &WindowHandle) -> Result<(), BackendError> {
        let hwnd = HWND(window.raw as *mut _);
        unsafe {
            if IsIconic(hwnd).as_bool() {
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            if !SetForegroundWindow(hwnd).as_bool() {
                return Err(BackendError::Os(format!(
                    "SetForegroundWindow refused for '{}'",
                    window.title
                )));
            }
        }
        debug!("Focused window '{}'", window.title);
        Ok(())
    }

    fn send_key(&mut self, key: KeyCode) -> Result<(), BackendError> {
        let vk = virtual_key(key)?;
        let flags = if is_extended_key(vk) {
            KEYEVENTF_EXTENDEDKEY
        } else {
            KEYBD_EVENT_FLAGS(0)
        };
        let inputs = [key_input(vk, flags), key_input(vk, flags | KEYEVENTF_KEYUP)];
        let sent = unsafe { SendInput(&inputs, mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(BackendError::Os(format!(
                "SendInput delivered {}/{} events for key {}",
                sent,
                inputs.len(),
                key
            )));
        }
        Ok(())
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let hwnds = &mut *(lparam.0 as *mut Vec<isize>);
    hwnds.push(hwnd.0 as isize);
    TRUE
}

fn key_input(vk: VIRTUAL_KEY, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn virtual_key(key: KeyCode) -> Result<VIRTUAL_KEY, BackendError> {
    let vk = match key {
        // Virtual-key codes for 0-9 and A-Z equal their upper-case ASCII values.
        KeyCode::Char(c) if c.is_ascii_alphanumeric() => {
            VIRTUAL_KEY(c.to_ascii_uppercase() as u16)
        }
        KeyCode::Char(c) => {
            return Err(BackendError::Os(format!("no virtual key for '{}'", c)));
        }
        KeyCode::Up => VK_UP,
        KeyCode::Down => VK_DOWN,
        KeyCode::PageUp => VK_PRIOR,
        KeyCode::PageDown => VK_NEXT,
        KeyCode::Home => VK_HOME,
        KeyCode::End => VK_END,
        KeyCode::Enter => VK_RETURN,
        KeyCode::Tab => VK_TAB,
        KeyCode::Space => VK_SPACE,
        KeyCode::F(n) => VIRTUAL_KEY(VK_F1.0 + u16::from(n.saturating_sub(1))),
    };
    Ok(vk)
}

fn is_extended_key(vk: VIRTUAL_KEY) -> bool {
    matches!(
        vk,
        VK_UP | VK_DOWN | VK_HOME | VK_END | VK_PRIOR | VK_NEXT
    )
}
