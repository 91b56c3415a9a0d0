//! Raw Event Interceptor
//!
//! Top-level filter installed on the host window's native message stream. It
//! owns the raw-input subscription for its whole lifetime, gates reports
//! through the [`FocusGate`], fetches and decodes them, and forwards the
//! translated result to the emulated devices.

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::input::error::{recovery_action, InputError, RecoveryAction, Result};
use crate::input::focus::FocusGate;
use crate::input::host::{
    default_subscriptions, DeviceSubscription, EmulatedDeviceSink, HostMessage, HostWindow,
    InputSource, MenuId, RawInputHandle, VK_F4,
};
use crate::input::keyboard::ScanCodeTranslator;
use crate::input::mouse::PointerStateTracker;
use crate::input::report::{HeaderLayout, MouseReport, RawReport};

/// Whether the filter swallowed a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Message handled here; the host must not process it further
    Consumed,
    /// Pass the message on to the host
    NotHandled,
}

/// Why a report never reached a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Fetch returned a different size than advertised
    SizeMismatch,
    /// Report bytes did not decode
    Malformed,
    /// Scan code resolved to the sentinel
    Untranslatable,
    /// No active target window
    Unrouted,
    /// Mouse report while capture is off
    CaptureDisabled,
}

/// Drop counters by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    /// Size mismatches
    pub size_mismatch: u64,
    /// Undecodable reports
    pub malformed: u64,
    /// Sentinel scan codes
    pub untranslatable: u64,
    /// Unrouted reports
    pub unrouted: u64,
    /// Mouse reports without capture
    pub capture_disabled: u64,
}

/// Interceptor event counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterceptorStats {
    /// Raw-input notifications seen
    pub raw_messages: u64,
    /// Reports decoded and dispatched
    pub reports_dispatched: u64,
    /// Key events forwarded
    pub keys_forwarded: u64,
    /// Mouse reports applied
    pub mouse_reports: u64,
    /// HID reports handed to the joystick layer
    pub hid_reports: u64,
    /// Close-window hotkeys swallowed
    pub hotkeys_suppressed: u64,
    /// Drops by reason
    pub drops: DropCounts,
}

impl InterceptorStats {
    fn record_drop(&mut self, reason: DropReason) {
        let counter = match reason {
            DropReason::SizeMismatch => &mut self.drops.size_mismatch,
            DropReason::Malformed => &mut self.drops.malformed,
            DropReason::Untranslatable => &mut self.drops.untranslatable,
            DropReason::Unrouted => &mut self.drops.unrouted,
            DropReason::CaptureDisabled => &mut self.drops.capture_disabled,
        };
        *counter += 1;
    }

    /// Total drops across all reasons
    pub fn total_drops(&self) -> u64 {
        let d = &self.drops;
        d.size_mismatch + d.malformed + d.untranslatable + d.unrouted + d.capture_disabled
    }
}

/// Translation settings for a filter instance
#[derive(Debug, Clone, Default)]
pub struct FilterSettings {
    /// Keyboard translator
    pub translator: ScanCodeTranslator,
    /// Mouse tracker (carries divisor and recentring policy)
    pub pointer: PointerStateTracker,
    /// Raw-input header layout
    pub layout: HeaderLayout,
}

/// Native event filter for one top-level window
pub struct RawEventInterceptor<S: InputSource, W: HostWindow, K: EmulatedDeviceSink> {
    source: S,
    window: W,
    sink: K,

    translator: ScanCodeTranslator,
    pointer: PointerStateTracker,
    gate: FocusGate,
    layout: HeaderLayout,

    /// Subscriptions to release on drop
    subscriptions: [DeviceSubscription; 2],

    /// Reused fetch buffer
    buffer: Vec<u8>,

    stats: InterceptorStats,
}

impl<S: InputSource, W: HostWindow, K: EmulatedDeviceSink> RawEventInterceptor<S, W, K> {
    /// Subscribe to keyboard and mouse raw input and build the filter.
    ///
    /// Fails when the host rejects the subscription; no filter exists then.
    pub fn register(mut source: S, window: W, sink: K, settings: FilterSettings) -> Result<Self> {
        let subscriptions = default_subscriptions();

        if let Err(e) = source.register_devices(&subscriptions) {
            warn!("Raw input registration failed: {}", e);
            return Err(e);
        }
        info!("Raw input registered for keyboard and mouse");

        let gate = FocusGate::new(window.menus());

        Ok(Self {
            source,
            window,
            sink,
            translator: settings.translator,
            pointer: settings.pointer,
            gate,
            layout: settings.layout,
            subscriptions,
            buffer: Vec::new(),
            stats: InterceptorStats::default(),
        })
    }

    /// Handle one native message
    pub fn handle(&mut self, message: &HostMessage) -> Disposition {
        match *message {
            HostMessage::RawInput { handle } => {
                self.stats.raw_messages += 1;

                let routed = self
                    .gate
                    .route(self.window.is_active(), self.window.surface_activity())
                    .ok_or(InputError::Unrouted)
                    .and_then(|target| {
                        trace!("Routing raw input {:?} to {:?}", handle, target);
                        self.fetch_and_dispatch(handle)
                    });

                if let Err(e) = routed {
                    self.record_failure(handle, e);
                }

                Disposition::Consumed
            }

            HostMessage::SysKeyDown { virtual_key } if virtual_key == VK_F4 => {
                debug!("Suppressing Alt+F4");
                self.stats.hotkeys_suppressed += 1;
                Disposition::Consumed
            }

            _ => Disposition::NotHandled,
        }
    }

    fn record_failure(&mut self, handle: RawInputHandle, error: InputError) {
        if recovery_action(&error) != RecoveryAction::Drop {
            warn!("Raw input {:?} failed: {}", handle, error);
            return;
        }

        trace!("Dropping raw input {:?}: {}", handle, error);
        let reason = match error {
            InputError::ReportSizeMismatch { .. } => DropReason::SizeMismatch,
            InputError::Untranslatable(_) => DropReason::Untranslatable,
            InputError::Unrouted => DropReason::Unrouted,
            _ => DropReason::Malformed,
        };
        self.stats.record_drop(reason);
    }

    fn fetch_and_dispatch(&mut self, handle: RawInputHandle) -> Result<()> {
        let requested = self
            .source
            .report_size(handle)
            .ok_or_else(|| InputError::MalformedReport("size query failed".to_string()))?;

        self.buffer.clear();
        self.buffer.resize(requested as usize, 0);

        let delivered = self
            .source
            .fetch_report(handle, &mut self.buffer)
            .unwrap_or(u32::MAX);
        if delivered != requested {
            return Err(InputError::ReportSizeMismatch {
                requested,
                delivered,
            });
        }

        let report = RawReport::decode(&self.buffer, self.layout)?;
        self.stats.reports_dispatched += 1;
        self.dispatch(report)
    }

    fn dispatch(&mut self, report: RawReport) -> Result<()> {
        match report {
            RawReport::Keyboard(kbd) => {
                let translation = self.translator.translate(&kbd);
                if translation.poll_fullscreen_hotkey {
                    self.window.check_fullscreen_hotkey();
                }
                match translation.event {
                    Some(event) => {
                        self.sink.submit_key_event(event.pressed, event.code);
                        self.stats.keys_forwarded += 1;
                        Ok(())
                    }
                    None => Err(InputError::Untranslatable(kbd.make_code)),
                }
            }

            RawReport::Mouse(mouse) => {
                if self.sink.capture_enabled() {
                    self.handle_mouse(&mouse);
                } else {
                    trace!("Mouse capture off, ignoring report");
                    self.stats.record_drop(DropReason::CaptureDisabled);
                }
                Ok(())
            }

            RawReport::Hid(hid) => {
                self.sink.dispatch_hid_report(&hid);
                self.stats.hid_reports += 1;
                Ok(())
            }
        }
    }

    fn handle_mouse(&mut self, report: &MouseReport) {
        let delta = self.pointer.update(report);

        if let Some(mask) = delta.buttons {
            self.sink.set_button_mask(mask);
        }
        if let Some(notches) = delta.wheel_notches {
            self.sink.set_wheel_notches(notches);
        }
        self.sink.scale_motion(delta.dx, delta.dy);

        if delta.recenter {
            let (x, y) = self.window.geometry().center();
            self.window.set_cursor_position(x, y);
        }

        self.stats.mouse_reports += 1;
    }

    /// A menu is about to show
    pub fn menu_about_to_show(&mut self, menu: MenuId) {
        self.gate.menu_about_to_show(menu);
    }

    /// A menu is about to hide
    pub fn menu_about_to_hide(&mut self, menu: MenuId) {
        self.gate.menu_about_to_hide(menu);
    }

    /// Open-menu counter
    pub fn menus_open(&self) -> i32 {
        self.gate.menus_open()
    }

    /// Event counters
    pub fn stats(&self) -> &InterceptorStats {
        &self.stats
    }

    /// Mouse tracker
    pub fn pointer(&self) -> &PointerStateTracker {
        &self.pointer
    }

    /// Keyboard translator
    pub fn translator(&self) -> &ScanCodeTranslator {
        &self.translator
    }

    /// Raw-input source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Raw-input source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Host window
    pub fn window(&self) -> &W {
        &self.window
    }

    /// Host window, mutably
    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    /// Device sink
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Device sink, mutably
    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }
}

impl<S: InputSource, W: HostWindow, K: EmulatedDeviceSink> Drop for RawEventInterceptor<S, W, K> {
    fn drop(&mut self) {
        let removal = self.subscriptions.map(DeviceSubscription::removal);
        match self.source.register_devices(&removal) {
            Ok(()) => info!("Raw input unregistered"),
            Err(e) => warn!("Raw input unregistration failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::host::{
        MockEmulatedDeviceSink, MockHostWindow, MockInputSource, SubscriptionFlag, WindowRect,
    };
    use crate::input::mouse::{MouseButton, RecenterPolicy};
    use crate::input::report::{ButtonTransition, HidReport, KeyFlag, KeyboardReport};
    use bytes::Bytes;
    use enumflags2::BitFlags;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const HANDLE: RawInputHandle = RawInputHandle(0x42);

    fn source_with(report: RawReport) -> MockInputSource {
        let bytes = report.encode(HeaderLayout::native());
        let len = bytes.len() as u32;

        let mut source = MockInputSource::new();
        source.expect_register_devices().returning(|_| Ok(()));
        source.expect_report_size().returning(move |_| Some(len));
        source.expect_fetch_report().returning(move |_, buf| {
            buf.copy_from_slice(&bytes);
            Some(len)
        });
        source
    }

    fn active_window() -> MockHostWindow {
        let mut window = MockHostWindow::new();
        window.expect_menus().return_const(vec![MenuId(1)]);
        window.expect_is_active().return_const(true);
        window.expect_surface_activity().return_const(Vec::<bool>::new());
        window
    }

    fn capturing_sink() -> MockEmulatedDeviceSink {
        let mut sink = MockEmulatedDeviceSink::new();
        sink.expect_capture_enabled().return_const(true);
        sink
    }

    fn raw_input() -> HostMessage {
        HostMessage::RawInput { handle: HANDLE }
    }

    #[test]
    fn test_registration_failure() {
        let mut source = MockInputSource::new();
        source
            .expect_register_devices()
            .times(1)
            .returning(|_| Err(InputError::RegistrationRejected("denied".to_string())));

        let result = RawEventInterceptor::register(
            source,
            MockHostWindow::new(),
            MockEmulatedDeviceSink::new(),
            FilterSettings::default(),
        );
        assert!(matches!(result, Err(InputError::RegistrationRejected(_))));
    }

    #[test]
    fn test_register_then_unregister_on_drop() {
        let mut seq = Sequence::new();
        let mut source = MockInputSource::new();
        source
            .expect_register_devices()
            .withf(|devices| {
                devices.len() == 2
                    && devices[0].flags == BitFlags::from(SubscriptionFlag::NoHotkeys)
                    && devices[1].flags.is_empty()
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        source
            .expect_register_devices()
            .withf(|devices| {
                devices.len() == 2
                    && devices
                        .iter()
                        .all(|d| d.flags == BitFlags::from(SubscriptionFlag::Remove))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut window = MockHostWindow::new();
        window.expect_menus().return_const(Vec::new());

        let interceptor = RawEventInterceptor::register(
            source,
            window,
            MockEmulatedDeviceSink::new(),
            FilterSettings::default(),
        )
        .unwrap();
        drop(interceptor);
    }

    #[test]
    fn test_unregister_failure_does_not_panic() {
        let mut source = MockInputSource::new();
        let mut calls = 0;
        source.expect_register_devices().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(InputError::RegistrationRejected("gone".to_string()))
            }
        });
        let mut window = MockHostWindow::new();
        window.expect_menus().return_const(Vec::new());

        let interceptor = RawEventInterceptor::register(
            source,
            window,
            MockEmulatedDeviceSink::new(),
            FilterSettings::default(),
        )
        .unwrap();
        drop(interceptor);
    }

    #[test]
    fn test_alt_f4_suppressed() {
        let mut window = MockHostWindow::new();
        window.expect_menus().return_const(Vec::new());
        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Keyboard(KeyboardReport::make(0x1E))),
            window,
            MockEmulatedDeviceSink::new(),
            FilterSettings::default(),
        )
        .unwrap();

        let result = interceptor.handle(&HostMessage::SysKeyDown { virtual_key: VK_F4 });
        assert_eq!(result, Disposition::Consumed);
        assert_eq!(interceptor.stats().hotkeys_suppressed, 1);

        let result = interceptor.handle(&HostMessage::SysKeyDown { virtual_key: 0x74 });
        assert_eq!(result, Disposition::NotHandled);

        let result = interceptor.handle(&HostMessage::Other { id: 0x0200 });
        assert_eq!(result, Disposition::NotHandled);
    }

    #[test]
    fn test_keyboard_forwarded() {
        let mut window = active_window();
        window.expect_check_fullscreen_hotkey().times(1).return_const(());

        let mut sink = MockEmulatedDeviceSink::new();
        sink.expect_submit_key_event()
            .with(eq(true), eq(0x11D))
            .times(1)
            .return_const(());

        let report = KeyboardReport::make(0x1D).with_flags(KeyFlag::E0);
        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Keyboard(report)),
            window,
            sink,
            FilterSettings::default(),
        )
        .unwrap();

        assert_eq!(interceptor.handle(&raw_input()), Disposition::Consumed);
        assert_eq!(interceptor.stats().keys_forwarded, 1);
    }

    #[test]
    fn test_e1_garbage_no_sink_call_no_poll() {
        // No expectations on the sink or fullscreen poll: any call panics
        let report = KeyboardReport::make(0x45).with_flags(KeyFlag::E1);
        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Keyboard(report)),
            active_window(),
            MockEmulatedDeviceSink::new(),
            FilterSettings::default(),
        )
        .unwrap();

        assert_eq!(interceptor.handle(&raw_input()), Disposition::Consumed);
        assert_eq!(interceptor.stats().drops.untranslatable, 1);
    }

    #[test]
    fn test_unrouted_when_menu_open() {
        let mut source = MockInputSource::new();
        source.expect_register_devices().returning(|_| Ok(()));
        // report_size/fetch_report must not be called

        let mut interceptor = RawEventInterceptor::register(
            source,
            active_window(),
            MockEmulatedDeviceSink::new(),
            FilterSettings::default(),
        )
        .unwrap();

        interceptor.menu_about_to_show(MenuId(1));
        assert_eq!(interceptor.menus_open(), 1);

        assert_eq!(interceptor.handle(&raw_input()), Disposition::Consumed);
        assert_eq!(interceptor.stats().drops.unrouted, 1);

        interceptor.menu_about_to_hide(MenuId(1));
        assert_eq!(interceptor.menus_open(), 0);
    }

    #[test]
    fn test_routed_to_active_surface_while_menu_open() {
        let mut window = MockHostWindow::new();
        window.expect_menus().return_const(vec![MenuId(1)]);
        window.expect_is_active().return_const(false);
        window.expect_surface_activity().return_const(vec![false, true]);

        let mut sink = MockEmulatedDeviceSink::new();
        sink.expect_dispatch_hid_report()
            .withf(|hid: &HidReport| hid.data == Bytes::from_static(&[7, 7]))
            .times(1)
            .return_const(());

        let hid = HidReport {
            device: 3,
            size_hid: 2,
            count: 1,
            data: Bytes::from_static(&[7, 7]),
        };
        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Hid(hid)),
            window,
            sink,
            FilterSettings::default(),
        )
        .unwrap();
        interceptor.menu_about_to_show(MenuId(1));

        interceptor.handle(&raw_input());
        assert_eq!(interceptor.stats().hid_reports, 1);
    }

    #[test]
    fn test_size_mismatch_dropped() {
        let mut source = MockInputSource::new();
        source.expect_register_devices().returning(|_| Ok(()));
        source.expect_report_size().returning(|_| Some(48));
        source.expect_fetch_report().returning(|_, _| Some(40));

        let mut interceptor = RawEventInterceptor::register(
            source,
            active_window(),
            MockEmulatedDeviceSink::new(),
            FilterSettings::default(),
        )
        .unwrap();

        assert_eq!(interceptor.handle(&raw_input()), Disposition::Consumed);
        assert_eq!(interceptor.stats().drops.size_mismatch, 1);
        assert_eq!(interceptor.stats().reports_dispatched, 0);
    }

    #[test]
    fn test_capture_disabled_ignores_mouse() {
        let mut sink = MockEmulatedDeviceSink::new();
        sink.expect_capture_enabled().return_const(false);

        let report = MouseReport::relative(5, 5).with_transitions(ButtonTransition::LeftDown);
        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Mouse(report)),
            active_window(),
            sink,
            FilterSettings::default(),
        )
        .unwrap();

        interceptor.handle(&raw_input());
        assert_eq!(interceptor.stats().drops.capture_disabled, 1);
        assert!(interceptor.pointer().buttons().is_empty());
    }

    #[test]
    fn test_relative_mouse_scenario() {
        let mut sink = capturing_sink();
        sink.expect_set_button_mask()
            .with(eq(BitFlags::from(MouseButton::Left)))
            .times(1)
            .return_const(());
        sink.expect_set_wheel_notches()
            .with(eq(2))
            .times(1)
            .return_const(());
        sink.expect_scale_motion()
            .with(eq(5), eq(-3))
            .times(1)
            .return_const(());

        // No geometry or cursor expectations: relative mode must not recentre
        let report = MouseReport::relative(5, -3)
            .with_transitions(ButtonTransition::LeftDown)
            .with_wheel(240);
        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Mouse(report)),
            active_window(),
            sink,
            FilterSettings::default(),
        )
        .unwrap();

        interceptor.handle(&raw_input());
        assert_eq!(interceptor.stats().mouse_reports, 1);
    }

    #[test]
    fn test_absolute_mouse_recentres() {
        let mut window = active_window();
        window.expect_geometry().return_const(WindowRect {
            left: 0,
            top: 0,
            right: 1000,
            bottom: 700,
        });
        window
            .expect_set_cursor_position()
            .with(eq(500), eq(350))
            .times(1)
            .return_const(());

        let mut sink = capturing_sink();
        sink.expect_scale_motion()
            .with(eq(4), eq(8))
            .times(1)
            .return_const(());

        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Mouse(MouseReport::absolute(100, 200))),
            window,
            sink,
            FilterSettings::default(),
        )
        .unwrap();

        interceptor.handle(&raw_input());
        assert_eq!(interceptor.pointer().state().last_x, 100);
    }

    #[test]
    fn test_recenter_always_policy() {
        let mut window = active_window();
        window.expect_geometry().return_const(WindowRect {
            left: 10,
            top: 10,
            right: 30,
            bottom: 50,
        });
        window
            .expect_set_cursor_position()
            .with(eq(20), eq(30))
            .times(1)
            .return_const(());

        let mut sink = capturing_sink();
        sink.expect_scale_motion().return_const(());

        let settings = FilterSettings {
            pointer: PointerStateTracker::new().with_recenter_policy(RecenterPolicy::Always),
            ..FilterSettings::default()
        };
        let mut interceptor = RawEventInterceptor::register(
            source_with(RawReport::Mouse(MouseReport::relative(1, 1))),
            window,
            sink,
            settings,
        )
        .unwrap();

        interceptor.handle(&raw_input());
    }
}
