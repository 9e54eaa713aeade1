//! The three-phase chain that follows one factory helper process from
//! creation to cleanup.
//!
//! Phase 1 ([`CreationWatcher`]) listens system-wide for new windows, finds
//! the first one owned by a fresh factory process, and adopts that pid.
//! Phase 2 ([`WindowWatcher`]) waits for the adopted process to show its
//! folder-view window.  Phase 3 ([`CloseWatcher`]) waits for a window of
//! that class to be destroyed, then kills the process and releases the pid.
//!
//! Each phase owns one subscription on one dedicated pump thread.  Handoff
//! is fire-and-forget: a phase starts its successor, then quits its own
//! loop.  The only state shared across phases is the [`TrackingRegistry`];
//! a pid belongs to exactly one chain from adoption until release.  A
//! helper whose window never appears, or never closes, pins one blocked
//! thread and one hook for good — accepted for the narrow set of launch
//! targets this chain exists for.

use std::collections::HashSet;
use std::sync::Arc;

use crate::process;
use crate::registry::TrackingRegistry;

// Object-lifecycle WinEvent ids (WinUser.h).  EVENT_OBJECT_DESTROY sits
// between CREATE and SHOW, which matters when subscribing to the range.
pub const EVENT_OBJECT_CREATE: u32 = 0x8000;
pub const EVENT_OBJECT_DESTROY: u32 = 0x8001;
pub const EVENT_OBJECT_SHOW: u32 = 0x8002;

/// Window class of the shell's folder-view windows, shared by control-panel
/// applets and Explorer shell folders.
pub const SHELL_FOLDER_WINDOW_CLASS: &str = "CabinetWClass";

// ── Phase 1: process creation ─────────────────────────────────────────────────

/// Watches system-wide window creation for the first new factory process.
pub struct CreationWatcher {
    ignored: HashSet<u32>,
    registry: Arc<TrackingRegistry>,
}

impl CreationWatcher {
    /// `ignored` is the pre-launch snapshot: factory helpers that already
    /// existed plus pids other chains own.  None of them may be adopted by
    /// this instance.
    pub fn new(ignored: HashSet<u32>, registry: Arc<TrackingRegistry>) -> Self {
        Self { ignored, registry }
    }

    /// Decides whether a creation notification for `pid` adopts it, with
    /// `is_factory` classifying the process.  On success the pid has been
    /// added to the registry and now belongs to this chain; a concurrent
    /// launch that adopted the same pid first wins instead.
    fn try_adopt(&self, pid: u32, is_factory: impl Fn(u32) -> bool) -> bool {
        if pid == 0 || self.ignored.contains(&pid) || !is_factory(pid) {
            return false;
        }
        self.registry.add(pid)
    }

    /// Spawns the Phase 1 pump thread and blocks until its system-wide hook
    /// is installed or has failed to install.  The caller may only launch
    /// the helper after this returns; launching earlier could let the
    /// creation notification slip past before the hook exists.
    #[cfg(windows)]
    pub fn start(self) {
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<()>(1);
        let spawned = std::thread::Builder::new()
            .name("creation-watch".into())
            .spawn(move || self.run(ready_tx));
        if let Err(e) = spawned {
            eprintln!("[watcher] Failed to spawn creation watcher: {e}");
            return;
        }
        // Err here means the thread bailed before the hook went in; either
        // way the launch proceeds, monitored or not.
        let _ = ready_rx.recv();
    }

    #[cfg(not(windows))]
    pub fn start(self) {}

    #[cfg(windows)]
    fn run(self, ready_tx: std::sync::mpsc::SyncSender<()>) {
        use crate::identify;
        use crate::winevent::{self, EventDecision, EventScope};

        let registry = Arc::clone(&self.registry);
        let result = winevent::run_event_loop(
            EventScope::System,
            EVENT_OBJECT_CREATE,
            EVENT_OBJECT_CREATE,
            move || {
                let _ = ready_tx.send(());
            },
            move |_event, hwnd| {
                let pid = winevent::window_pid(hwnd);
                if !self.try_adopt(pid, identify::is_factory_process) {
                    return EventDecision::Continue;
                }
                eprintln!("[watcher] Adopted factory process {pid}");
                WindowWatcher::new(pid, Arc::clone(&registry)).start();
                EventDecision::Quit
            },
        );
        if let Err(e) = result {
            // Degraded outcome: the helper (if any) runs unmonitored.
            eprintln!("[watcher] Creation hook failed: {e}");
        }
    }
}

// ── Phase 2: window appearance ────────────────────────────────────────────────

/// Watches an adopted pid for its folder-view window to appear.
pub struct WindowWatcher {
    pid: u32,
    registry: Arc<TrackingRegistry>,
}

impl WindowWatcher {
    pub fn new(pid: u32, registry: Arc<TrackingRegistry>) -> Self {
        Self { pid, registry }
    }

    /// True when this notification is the adopted process showing its
    /// folder-view window.  The subscribed range `[CREATE, SHOW]` also
    /// covers DESTROY, which must be ignored here.
    fn window_appeared(event: u32, class: &str) -> bool {
        (event == EVENT_OBJECT_CREATE || event == EVENT_OBJECT_SHOW)
            && class == SHELL_FOLDER_WINDOW_CLASS
    }

    #[cfg(windows)]
    pub fn start(self) {
        let pid = self.pid;
        let registry = Arc::clone(&self.registry);
        let spawned = std::thread::Builder::new()
            .name("window-watch".into())
            .spawn(move || self.run());
        if let Err(e) = spawned {
            // No watcher will ever run for this pid; release it.
            eprintln!("[watcher] Failed to spawn window watcher for pid {pid}: {e}");
            registry.remove(pid);
        }
    }

    #[cfg(not(windows))]
    pub fn start(self) {}

    #[cfg(windows)]
    fn run(self) {
        use crate::winevent::{self, EventDecision, EventScope};

        let pid = self.pid;
        let registry = Arc::clone(&self.registry);
        let result = winevent::run_event_loop(
            EventScope::Process(pid),
            EVENT_OBJECT_CREATE,
            EVENT_OBJECT_SHOW,
            || {},
            move |event, hwnd| {
                if !Self::window_appeared(event, &winevent::window_class(hwnd)) {
                    return EventDecision::Continue;
                }
                CloseWatcher::new(pid, Arc::clone(&registry)).start();
                EventDecision::Quit
            },
        );
        if let Err(e) = result {
            // Scoped hooks cannot be installed for a pid that already
            // exited; no window will ever appear for a dead process.
            eprintln!("[watcher] Window hook failed for pid {pid}: {e}");
            self.registry.remove(pid);
        }
    }
}

// ── Phase 3: window destruction and cleanup ───────────────────────────────────

/// Watches an adopted pid whose folder-view window exists, and cleans up
/// once a window of that class is destroyed.
pub struct CloseWatcher {
    pid: u32,
    registry: Arc<TrackingRegistry>,
}

impl CloseWatcher {
    pub fn new(pid: u32, registry: Arc<TrackingRegistry>) -> Self {
        Self { pid, registry }
    }

    /// True when this notification is the terminal signal.  Any destroyed
    /// window of the folder-view class counts; the chain assumes one such
    /// window per adopted helper and does not track the window instance.
    fn is_terminal(event: u32, class: &str) -> bool {
        event == EVENT_OBJECT_DESTROY && class == SHELL_FOLDER_WINDOW_CLASS
    }

    #[cfg(windows)]
    pub fn start(self) {
        let pid = self.pid;
        let registry = Arc::clone(&self.registry);
        let spawned = std::thread::Builder::new()
            .name("close-watch".into())
            .spawn(move || self.run());
        if let Err(e) = spawned {
            eprintln!("[watcher] Failed to spawn close watcher for pid {pid}: {e}");
            finish(pid, &registry);
        }
    }

    #[cfg(not(windows))]
    pub fn start(self) {}

    #[cfg(windows)]
    fn run(self) {
        use crate::winevent::{self, EventDecision, EventScope};

        let result = winevent::run_event_loop(
            EventScope::Process(self.pid),
            EVENT_OBJECT_DESTROY,
            EVENT_OBJECT_DESTROY,
            || {},
            |event, hwnd| {
                if Self::is_terminal(event, &winevent::window_class(hwnd)) {
                    EventDecision::Quit
                } else {
                    EventDecision::Continue
                }
            },
        );
        if let Err(e) = result {
            eprintln!("[watcher] Close hook failed for pid {}: {e}", self.pid);
        }
        // Matched, or the hook never went in: either way the window is gone
        // or was never coming back.  Kill the helper and release the pid.
        finish(self.pid, &self.registry);
    }
}

/// Phase 3 cleanup: terminate the helper (already-exited counts as success)
/// and stop tracking it.
fn finish(pid: u32, registry: &TrackingRegistry) {
    process::terminate(pid);
    registry.remove(pid);
    eprintln!("[watcher] Released factory process {pid}");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ignored: &[u32]) -> (CreationWatcher, Arc<TrackingRegistry>) {
        let registry = Arc::new(TrackingRegistry::new());
        let watcher = CreationWatcher::new(ignored.iter().copied().collect(), Arc::clone(&registry));
        (watcher, registry)
    }

    // ── Phase 1 adoption ──────────────────────────────────────────────────────

    #[test]
    fn adopts_a_fresh_factory_pid() {
        let (watcher, registry) = chain(&[]);
        assert!(watcher.try_adopt(4000, |_| true));
        assert!(registry.contains_any(&HashSet::from([4000])));
    }

    #[test]
    fn never_adopts_pid_zero() {
        let (watcher, _) = chain(&[]);
        assert!(!watcher.try_adopt(0, |_| true));
    }

    #[test]
    fn never_adopts_an_ignored_pid() {
        let (watcher, registry) = chain(&[4000]);
        assert!(!watcher.try_adopt(4000, |_| true));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn never_adopts_a_non_factory_pid() {
        let (watcher, registry) = chain(&[]);
        assert!(!watcher.try_adopt(4001, |_| false));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn concurrent_chains_cannot_adopt_the_same_pid() {
        let registry = Arc::new(TrackingRegistry::new());
        let first = CreationWatcher::new(HashSet::new(), Arc::clone(&registry));
        let second = CreationWatcher::new(HashSet::new(), Arc::clone(&registry));
        assert!(first.try_adopt(4000, |_| true));
        assert!(!second.try_adopt(4000, |_| true));
    }

    // ── Phase 2 window matching ───────────────────────────────────────────────

    #[test]
    fn folder_window_create_and_show_both_count() {
        assert!(WindowWatcher::window_appeared(
            EVENT_OBJECT_CREATE,
            SHELL_FOLDER_WINDOW_CLASS
        ));
        assert!(WindowWatcher::window_appeared(
            EVENT_OBJECT_SHOW,
            SHELL_FOLDER_WINDOW_CLASS
        ));
    }

    #[test]
    fn destroy_inside_the_subscribed_range_is_filtered_out() {
        assert!(!WindowWatcher::window_appeared(
            EVENT_OBJECT_DESTROY,
            SHELL_FOLDER_WINDOW_CLASS
        ));
    }

    #[test]
    fn other_window_classes_do_not_count_as_appearance() {
        assert!(!WindowWatcher::window_appeared(EVENT_OBJECT_SHOW, "Shell_TrayWnd"));
        assert!(!WindowWatcher::window_appeared(EVENT_OBJECT_SHOW, ""));
    }

    // ── Phase 3 terminal signal ───────────────────────────────────────────────

    #[test]
    fn only_a_destroyed_folder_window_is_terminal() {
        assert!(CloseWatcher::is_terminal(
            EVENT_OBJECT_DESTROY,
            SHELL_FOLDER_WINDOW_CLASS
        ));
        assert!(!CloseWatcher::is_terminal(EVENT_OBJECT_DESTROY, "Notepad"));
        assert!(!CloseWatcher::is_terminal(
            EVENT_OBJECT_CREATE,
            SHELL_FOLDER_WINDOW_CLASS
        ));
    }

    #[test]
    fn finish_removes_the_pid_exactly_once() {
        let registry = TrackingRegistry::new();
        registry.add(4000);
        finish(4000, &registry);
        assert!(!registry.remove(4000));
        // A second cleanup for the same pid (already-dead process, already
        // released pid) must stay silent.
        finish(4000, &registry);
    }

    // ── Full chain over mocked classification ─────────────────────────────────

    /// Walks the pid-4000 scenario: a fresh factory process appears while an
    /// unrelated explorer (4001) is running, its folder window shows, the
    /// window is destroyed, and the pid ends up terminated and untracked.
    #[test]
    fn lifecycle_of_an_adopted_helper() {
        let is_factory = |pid: u32| pid == 4000;
        let (watcher, registry) = chain(&[]);

        // Creation notifications arrive for both processes; only the
        // factory one is adopted.
        assert!(!watcher.try_adopt(4001, is_factory));
        assert!(watcher.try_adopt(4000, is_factory));
        assert!(registry.contains_any(&HashSet::from([4000])));

        // Phase 2 sees unrelated windows first, then the folder view.
        assert!(!WindowWatcher::window_appeared(EVENT_OBJECT_CREATE, "WorkerW"));
        assert!(WindowWatcher::window_appeared(
            EVENT_OBJECT_SHOW,
            SHELL_FOLDER_WINDOW_CLASS
        ));

        // Phase 3 sees the folder window go away and cleans up.
        assert!(CloseWatcher::is_terminal(
            EVENT_OBJECT_DESTROY,
            SHELL_FOLDER_WINDOW_CLASS
        ));
        finish(4000, &registry);
        assert!(registry.snapshot().is_empty());
    }
}
