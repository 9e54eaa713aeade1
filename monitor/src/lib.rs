//! Cleanup of the throwaway `explorer.exe` helpers that Windows spawns for
//! control-panel applet and shell-folder launches.
//!
//! Opening `ncpa.cpl` or a `shell:::{...}` folder makes COM activate a
//! factory-hosted `explorer.exe` (`/factory,{CLSID} -Embedding`) to host the
//! folder view.  Left alone, that helper keeps running after its window
//! closes.  This crate performs those launches itself and chains three
//! WinEvent subscriptions — process creation, window appearance, window
//! destruction — so the helper is terminated the moment its folder window
//! goes away.  The launch call never yields a handle to the helper, so the
//! new process is recognised by reading its command line out of its own
//! address space.
//!
//! The two entry points, [`open_control_panel`] and [`open_shell_folder`],
//! are fire-and-forget: every internal failure degrades to an ordinary
//! unmonitored launch and nothing is reported to the caller.  On non-Windows
//! platforms the crate compiles and the entry points are no-ops.

pub mod identify;
mod launch;
mod process;
mod registry;
#[cfg_attr(not(windows), allow(dead_code))]
mod watcher;
#[cfg(windows)]
mod winevent;

pub use launch::{open_control_panel, open_shell_folder};
