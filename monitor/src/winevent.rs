//! Blocking WinEvent subscriptions with a per-thread message pump.
//!
//! Hooks registered with `WINEVENT_OUTOFCONTEXT` deliver their callbacks on
//! the registering thread, which must therefore pump messages.
//! [`run_event_loop`] installs one hook, parks the calling thread in a
//! `GetMessageW` loop, and routes every notification to a handler closure
//! held in thread-local storage — the Win32 callback carries no user-data
//! pointer, so the closure cannot travel through it.  One hook per pump
//! thread.
//!
//! When the handler returns [`EventDecision::Quit`] it is dropped on the
//! spot (notifications already queued behind the quit are ignored) and
//! `WM_QUIT` is posted to the pump's own thread, which unwinds the loop and
//! releases the hook.

use std::cell::RefCell;

use anyhow::{bail, Result};
use windows::Win32::Foundation::{HMODULE, HWND, LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetClassNameW, GetMessageW, GetWindowThreadProcessId, PostThreadMessageW,
    MSG, OBJID_WINDOW, WINEVENT_OUTOFCONTEXT, WM_QUIT,
};

/// What the pump should do after a handled notification.
pub enum EventDecision {
    Continue,
    Quit,
}

/// Scope of a subscription: every process on the desktop, or a single pid.
pub enum EventScope {
    System,
    Process(u32),
}

impl EventScope {
    fn id_process(&self) -> u32 {
        match self {
            EventScope::System => 0,
            EventScope::Process(pid) => *pid,
        }
    }
}

type Handler = Box<dyn FnMut(u32, HWND) -> EventDecision>;

thread_local! {
    /// Handler for the hook owned by this pump thread.
    static HANDLER: RefCell<Option<Handler>> = const { RefCell::new(None) };
}

unsafe extern "system" fn win_event_proc(
    _hook: HWINEVENTHOOK,
    event: u32,
    hwnd: HWND,
    id_object: i32,
    _id_child: i32,
    _event_thread: u32,
    _event_time: u32,
) {
    // The object-lifecycle event ids also fire for child objects, carets and
    // cursors; only top-level window objects are interesting here.
    if id_object != OBJID_WINDOW.0 || hwnd.is_invalid() {
        return;
    }

    let quit = HANDLER.with(|slot| {
        let mut slot = slot.borrow_mut();
        match slot.as_mut() {
            Some(handler) => {
                if matches!(handler(event, hwnd), EventDecision::Quit) {
                    // Drop the handler so notifications queued behind the
                    // WM_QUIT below are not delivered to it.
                    *slot = None;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    });

    if quit {
        let _ = PostThreadMessageW(GetCurrentThreadId(), WM_QUIT, WPARAM(0), LPARAM(0));
    }
}

/// Installs a WinEvent hook for the inclusive id range
/// `[event_min, event_max]` under `scope` and pumps messages on the calling
/// thread until the handler quits.
///
/// `on_ready` fires once the hook is live, before the pump starts; a caller
/// that must not race the subscription (Phase 1's launch ordering) can
/// signal from it.  Returns an error only when the hook cannot be installed,
/// in which case `on_ready` never fires and no notification was observed.
pub fn run_event_loop<F>(
    scope: EventScope,
    event_min: u32,
    event_max: u32,
    on_ready: impl FnOnce(),
    handler: F,
) -> Result<()>
where
    F: FnMut(u32, HWND) -> EventDecision + 'static,
{
    unsafe {
        let hook = SetWinEventHook(
            event_min,
            event_max,
            HMODULE::default(),
            Some(win_event_proc),
            scope.id_process(),
            0,
            WINEVENT_OUTOFCONTEXT,
        );
        if hook.is_invalid() {
            bail!("SetWinEventHook({event_min:#06x}..={event_max:#06x}) failed");
        }

        HANDLER.with(|slot| *slot.borrow_mut() = Some(Box::new(handler)));
        on_ready();

        let mut msg = MSG::default();
        // GetMessageW: >0 = message, 0 = WM_QUIT, <0 = error.
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            DispatchMessageW(&msg);
        }

        HANDLER.with(|slot| *slot.borrow_mut() = None);
        let _ = UnhookWinEvent(hook);
        Ok(())
    }
}

/// Resolves the owning process of `hwnd`; 0 when the window is already gone.
pub fn window_pid(hwnd: HWND) -> u32 {
    let mut pid = 0u32;
    unsafe {
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
    }
    pid
}

/// Resolves the window class name of `hwnd`, or an empty string when the
/// window no longer exists.
pub fn window_class(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    if len <= 0 {
        return String::new();
    }
    String::from_utf16_lossy(&buf[..len as usize])
}
