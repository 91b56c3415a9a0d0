//! Windows Raw Input Backend
//!
//! [`InputSource`] and [`HostWindow`] implementations over the Win32 Raw Input
//! API. Subscriptions target the foreground window of the calling thread; the
//! window procedure forwards `WM_INPUT` and `WM_SYSKEYDOWN` to the interceptor.

use std::mem::size_of;

use tracing::{debug, warn};
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::UI::Input::KeyboardAndMouse::GetActiveWindow;
use windows::Win32::UI::Input::{
    GetRawInputData, RegisterRawInputDevices, HRAWINPUT, RAWINPUTDEVICE, RAWINPUTDEVICE_FLAGS,
    RAWINPUTHEADER, RIDEV_NOHOTKEYS, RIDEV_REMOVE, RID_INPUT,
};
use windows::Win32::UI::WindowsAndMessaging::{GetWindowRect, SetCursorPos};

use crate::input::error::{InputError, Result};
use crate::input::host::{
    DeviceSubscription, HostWindow, InputSource, MenuId, RawInputHandle, SubscriptionFlag,
    WindowRect,
};

/// `GetRawInputData` failure value
const RAW_INPUT_ERROR: u32 = u32::MAX;

fn native_flags(subscription: &DeviceSubscription) -> RAWINPUTDEVICE_FLAGS {
    let mut flags = RAWINPUTDEVICE_FLAGS(0);
    if subscription.flags.contains(SubscriptionFlag::Remove) {
        flags |= RIDEV_REMOVE;
    }
    if subscription.flags.contains(SubscriptionFlag::NoHotkeys) {
        flags |= RIDEV_NOHOTKEYS;
    }
    flags
}

/// Raw input retrieval through `user32`
#[derive(Debug, Default)]
pub struct Win32InputSource;

impl Win32InputSource {
    /// Create a source
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for Win32InputSource {
    fn register_devices(&mut self, devices: &[DeviceSubscription]) -> Result<()> {
        let native: Vec<RAWINPUTDEVICE> = devices
            .iter()
            .map(|device| RAWINPUTDEVICE {
                usUsagePage: device.usage_page,
                usUsage: device.usage,
                dwFlags: native_flags(device),
                // Removal requires a null target; registration follows focus
                hwndTarget: HWND::default(),
            })
            .collect();

        unsafe { RegisterRawInputDevices(&native, size_of::<RAWINPUTDEVICE>() as u32) }
            .map_err(|e| InputError::RegistrationRejected(e.to_string()))?;

        debug!("RegisterRawInputDevices accepted {} classes", native.len());
        Ok(())
    }

    fn report_size(&mut self, handle: RawInputHandle) -> Option<u32> {
        let mut size = 0u32;
        let result = unsafe {
            GetRawInputData(
                HRAWINPUT(handle.0 as _),
                RID_INPUT,
                None,
                &mut size,
                size_of::<RAWINPUTHEADER>() as u32,
            )
        };

        if result == RAW_INPUT_ERROR {
            warn!("GetRawInputData size query failed for {:?}", handle);
            return None;
        }
        Some(size)
    }

    fn fetch_report(&mut self, handle: RawInputHandle, buf: &mut [u8]) -> Option<u32> {
        let mut size = buf.len() as u32;
        let result = unsafe {
            GetRawInputData(
                HRAWINPUT(handle.0 as _),
                RID_INPUT,
                Some(buf.as_mut_ptr() as _),
                &mut size,
                size_of::<RAWINPUTHEADER>() as u32,
            )
        };

        (result != RAW_INPUT_ERROR).then_some(result)
    }
}

/// Top-level window and its secondary render surfaces
pub struct Win32Window {
    hwnd: HWND,
    surfaces: Vec<HWND>,
    menus: Vec<MenuId>,
    on_fullscreen_check: Box<dyn FnMut()>,
}

impl Win32Window {
    /// Wrap a window handle
    pub fn new(hwnd: HWND) -> Self {
        Self {
            hwnd,
            surfaces: Vec::new(),
            menus: Vec::new(),
            on_fullscreen_check: Box::new(|| {}),
        }
    }

    /// Secondary render surface windows, in routing order
    pub fn with_surfaces(mut self, surfaces: Vec<HWND>) -> Self {
        self.surfaces = surfaces;
        self
    }

    /// Menus reachable from the window
    pub fn with_menus(mut self, menus: Vec<MenuId>) -> Self {
        self.menus = menus;
        self
    }

    /// Called on every fullscreen hotkey check
    pub fn on_fullscreen_check(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_fullscreen_check = Box::new(callback);
        self
    }
}

impl HostWindow for Win32Window {
    fn is_active(&self) -> bool {
        unsafe { GetActiveWindow() == self.hwnd }
    }

    fn surface_activity(&self) -> Vec<bool> {
        let active = unsafe { GetActiveWindow() };
        self.surfaces.iter().map(|surface| *surface == active).collect()
    }

    fn menus(&self) -> Vec<MenuId> {
        self.menus.clone()
    }

    fn geometry(&self) -> WindowRect {
        let mut rect = RECT::default();
        if let Err(e) = unsafe { GetWindowRect(self.hwnd, &mut rect) } {
            warn!("GetWindowRect failed: {}", e);
        }
        WindowRect {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        }
    }

    fn set_cursor_position(&mut self, x: i32, y: i32) {
        if let Err(e) = unsafe { SetCursorPos(x, y) } {
            warn!("SetCursorPos({}, {}) failed: {}", x, y, e);
        }
    }

    fn check_fullscreen_hotkey(&mut self) {
        (self.on_fullscreen_check)();
    }
}
