//! Entry points that launch the network control-panel applet or the
//! Network Connections shell folder with cleanup monitoring attached.
//!
//! Both calls are fire-and-forget: hook setup failures, launch failures and
//! the eventual cleanup all happen (or quietly fail) in the background.  The
//! worst outcome of any failure is an `explorer.exe` helper that lingers
//! after its window closes — the status quo without this crate.

use anyhow::Result;

use crate::process;
use crate::registry;
use crate::watcher::CreationWatcher;

/// The network-connections control-panel applet.
const CONTROL_PANEL_APPLET: &str = "ncpa.cpl";

/// The Network Connections shell folder, opened through `explorer.exe`.
const SHELL_FOLDER_HOST: &str = "explorer.exe";
const SHELL_FOLDER_URI: &str = "shell:::{7007ACC7-3202-11D1-AAD2-00805FC1270E}";

/// Opens the network control-panel applet and monitors the `explorer.exe`
/// helper the shell spawns to host it.
pub fn open_control_panel() {
    open_and_monitor(CONTROL_PANEL_APPLET, None);
}

/// Opens the Network Connections shell folder and monitors its helper.
pub fn open_shell_folder() {
    open_and_monitor(SHELL_FOLDER_HOST, Some(SHELL_FOLDER_URI));
}

/// Snapshots the pids that must never be adopted (factory helpers that
/// already exist plus pids other chains own), arms Phase 1, waits for its
/// hook to be live, and only then launches the target.
///
/// The ordering is the correctness invariant of the whole chain: launching
/// before the subscription is active could lose the creation notification
/// for the very process this call is supposed to clean up after.
fn open_and_monitor(file: &str, args: Option<&str>) {
    let registry = registry::shared();
    let mut ignored = process::factory_pids();
    ignored.extend(registry.snapshot());

    CreationWatcher::new(ignored, registry).start();

    if let Err(e) = launch(file, args) {
        eprintln!("[launch] Failed to start {file}: {e}");
    }
}

/// Starts `file` through its shell association, like double-clicking it.
fn launch(file: &str, args: Option<&str>) -> Result<()> {
    #[cfg(windows)]
    {
        imp::shell_execute(file, args)
    }
    #[cfg(not(windows))]
    {
        let _ = (file, args);
        Ok(())
    }
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use anyhow::{bail, Result};
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Shell::ShellExecuteW;
    use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    /// Converts a Rust `&str` to a null-terminated UTF-16 `Vec<u16>`.
    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    pub fn shell_execute(file: &str, args: Option<&str>) -> Result<()> {
        let file_w = to_wide(file);
        let args_w = args.map(to_wide);

        let instance = unsafe {
            ShellExecuteW(
                HWND::default(),
                PCWSTR::null(), // default verb
                PCWSTR(file_w.as_ptr()),
                args_w
                    .as_ref()
                    .map_or(PCWSTR::null(), |w| PCWSTR(w.as_ptr())),
                PCWSTR::null(),
                SW_SHOWNORMAL,
            )
        };

        // ShellExecuteW signals failure through a fake HINSTANCE <= 32.
        let code = instance.0 as usize;
        if code <= 32 {
            bail!("ShellExecuteW({file}) failed with code {code}");
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    // On non-Windows platforms the entry points must return immediately
    // without doing anything.  (On Windows they would really open windows,
    // so the live path is exercised manually, not here.)
    #[cfg(not(windows))]
    #[test]
    fn entry_points_are_no_ops_off_windows() {
        super::open_control_panel();
        super::open_shell_folder();
    }
}
