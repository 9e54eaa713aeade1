//! Identification of factory-hosted `explorer.exe` helper processes.
//!
//! When the shell opens a control-panel applet or a shell-folder view, COM
//! may start a dedicated `explorer.exe` host with a
//! `/factory,{CLSID} -Embedding` command line.  [`is_factory_process`]
//! decides whether a pid is such a host by reading the command line out of
//! the target's address space: `NtQueryInformationProcess` locates the
//! remote PEB, the PEB points at `RTL_USER_PROCESS_PARAMETERS`, and the
//! `CommandLine` buffer is copied over with `ReadProcessMemory`.
//!
//! Anything that can go wrong along the way — process already exited, access
//! denied, partial read — resolves to "not a match".  On non-Windows
//! platforms the functions compile but never match.

/// Command-line fragments that mark an `explorer.exe` instance as a
/// factory-hosted helper rather than the user's shell.
const FACTORY_SIGNATURES: [&str; 2] = [
    // Control-panel applet host (ncpa.cpl)
    "/factory,{5BD95610-9434-43C2-886C-57852CC8A120} -Embedding",
    // Shell-folder view host
    "/factory,{75dff2b7-6936-4c06-a8bb-676a7b00b24b} -Embedding",
];

/// Returns true when `command_line` carries one of the known factory
/// signatures.  Matching is case-insensitive substring containment, not an
/// exact comparison.
pub fn is_factory_command_line(command_line: &str) -> bool {
    let lower = command_line.to_lowercase();
    FACTORY_SIGNATURES
        .iter()
        .any(|sig| lower.contains(&sig.to_lowercase()))
}

/// Returns true when `pid` is a running factory-hosted helper process.
pub fn is_factory_process(pid: u32) -> bool {
    command_line_of(pid).is_some_and(|cl| is_factory_command_line(&cl))
}

/// Reads the full command line of `pid` from its address space, or `None`
/// when the process is gone or cannot be read.
pub fn command_line_of(pid: u32) -> Option<String> {
    #[cfg(windows)]
    {
        imp::read_command_line(pid)
    }
    #[cfg(not(windows))]
    {
        let _ = pid;
        None
    }
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use std::ffi::c_void;
    use std::mem;

    use windows::Wdk::System::Threading::{NtQueryInformationProcess, ProcessBasicInformation};
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows::Win32::System::Threading::{
        OpenProcess, PEB, PROCESS_BASIC_INFORMATION, PROCESS_QUERY_LIMITED_INFORMATION,
        PROCESS_VM_READ, RTL_USER_PROCESS_PARAMETERS,
    };

    /// Closes the process handle on drop.
    struct ProcessHandle(HANDLE);

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    /// Copies a `T` at `addr` in the target process into local memory.
    /// Fails on any partial read.
    ///
    /// # Safety
    /// `T` must be valid for any bit pattern (the remote structs used here
    /// are plain integers and pointers).
    unsafe fn read_remote<T>(process: HANDLE, addr: *const c_void) -> Option<T> {
        let mut value = mem::MaybeUninit::<T>::zeroed();
        ReadProcessMemory(
            process,
            addr,
            value.as_mut_ptr() as *mut c_void,
            mem::size_of::<T>(),
            None,
        )
        .ok()?;
        Some(value.assume_init())
    }

    /// Walks PEB → `RTL_USER_PROCESS_PARAMETERS` → `CommandLine` in the
    /// target process.
    ///
    /// The remote structs are read with the `windows` crate's native
    /// definitions, so every pointer-sized field uses the platform's actual
    /// pointer width.
    pub fn read_command_line(pid: u32) -> Option<String> {
        unsafe {
            let handle =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_VM_READ, false, pid)
                    .ok()?;
            let process = ProcessHandle(handle);

            let mut info: PROCESS_BASIC_INFORMATION = mem::zeroed();
            let mut returned = 0u32;
            let status = NtQueryInformationProcess(
                process.0,
                ProcessBasicInformation,
                &mut info as *mut _ as *mut c_void,
                mem::size_of::<PROCESS_BASIC_INFORMATION>() as u32,
                &mut returned,
            );
            if status.is_err() || info.PebBaseAddress.is_null() {
                return None;
            }

            let peb: PEB = read_remote(process.0, info.PebBaseAddress as *const c_void)?;
            if peb.ProcessParameters.is_null() {
                return None;
            }
            let params: RTL_USER_PROCESS_PARAMETERS =
                read_remote(process.0, peb.ProcessParameters as *const c_void)?;

            let cmdline = params.CommandLine;
            if cmdline.Buffer.is_null() || cmdline.Length == 0 {
                return None;
            }

            // Length is in bytes; the buffer is UTF-16 and not guaranteed to
            // be null-terminated.
            let mut buf = vec![0u16; cmdline.Length as usize / 2];
            ReadProcessMemory(
                process.0,
                cmdline.Buffer.as_ptr() as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                cmdline.Length as usize,
                None,
            )
            .ok()?;
            Some(String::from_utf16_lossy(&buf))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const APPLET_SIGNATURE: &str = "/factory,{5BD95610-9434-43C2-886C-57852CC8A120} -Embedding";

    // ── Signature matching ────────────────────────────────────────────────────

    #[test]
    fn matches_applet_signature_exactly() {
        assert!(is_factory_command_line(APPLET_SIGNATURE));
    }

    #[test]
    fn matches_signature_embedded_in_full_command_line() {
        let cl = format!(r#""C:\Windows\explorer.exe" {APPLET_SIGNATURE}"#);
        assert!(is_factory_command_line(&cl));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(is_factory_command_line(&APPLET_SIGNATURE.to_lowercase()));
        assert!(is_factory_command_line(&APPLET_SIGNATURE.to_uppercase()));
    }

    #[test]
    fn matches_shell_folder_signature() {
        let cl = r#""C:\Windows\explorer.exe" /factory,{75DFF2B7-6936-4C06-A8BB-676A7B00B24B} -Embedding"#;
        assert!(is_factory_command_line(cl));
    }

    #[test]
    fn plain_explorer_command_line_does_not_match() {
        assert!(!is_factory_command_line(r"C:\Windows\explorer.exe"));
        assert!(!is_factory_command_line(r#""C:\Windows\explorer.exe" C:\Users"#));
    }

    #[test]
    fn unrelated_command_lines_do_not_match() {
        assert!(!is_factory_command_line(""));
        assert!(!is_factory_command_line("notepad.exe -Embedding"));
        // Wrong CLSID, right shape.
        assert!(!is_factory_command_line(
            "/factory,{00000000-0000-0000-0000-000000000000} -Embedding"
        ));
    }

    // ── Process inspection failure paths ──────────────────────────────────────

    #[test]
    fn nonexistent_pid_is_not_a_factory_process() {
        // No valid pid sits at u32::MAX; the open fails and the answer is a
        // plain false, never a panic.
        assert!(!is_factory_process(u32::MAX));
    }

    #[test]
    fn nonexistent_pid_has_no_readable_command_line() {
        assert_eq!(command_line_of(u32::MAX), None);
    }
}
