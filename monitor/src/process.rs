//! Process-level collaborators: enumerating running `explorer.exe`
//! instances and forcibly ending an adopted helper.

use std::collections::HashSet;

use sysinfo::{ProcessesToUpdate, System};

use crate::identify;

/// Pids of every factory-hosted `explorer.exe` currently running.
///
/// Taken as the "pre-existing" part of Phase 1's ignore snapshot so that a
/// launch request only ever adopts a helper created after it.
pub fn factory_pids() -> HashSet<u32> {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, false);
    sys.processes()
        .values()
        .filter(|p| {
            p.name()
                .to_string_lossy()
                .eq_ignore_ascii_case("explorer.exe")
        })
        .map(|p| p.pid().as_u32())
        .filter(|&pid| identify::is_factory_process(pid))
        .collect()
}

/// Forcibly ends `pid`.
///
/// A process that has already exited counts as success: the open fails for a
/// pid that no longer exists and there is nothing left to clean up.  Nothing
/// is reported either way.
pub fn terminate(pid: u32) {
    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            if let Ok(handle) = OpenProcess(PROCESS_TERMINATE, false, pid) {
                let _ = TerminateProcess(handle, 1);
                let _ = CloseHandle(handle);
            }
        }
    }
    #[cfg(not(windows))]
    {
        let _ = pid;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
