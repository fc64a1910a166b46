//! Power-cut injection for crash-recovery testing.
//!
//! With the `test-hooks` feature, every journal instance carries a runtime
//! [`TestFlags`] word and an optional power-cut callback. When a flagged
//! point is reached (and the log is non-empty), the callback fires and the
//! surrounding operation returns `Ok` immediately without running its
//! continuation - the in-process stand-in for yanking the power on a real
//! board.
//!
//! Test-only; production builds compile this module out.

use alloc::boxed::Box;

bitflags::bitflags! {
    /// Runtime flags selecting the injection points. Not persisted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TestFlags: u32 {
        /// Leave the transaction OPEN at `stop(true)` entry, before the
        /// master is updated to COMMIT.
        const STOP_SKIP_COMMIT = 0x0000_0001;
        /// Cut after the master is updated to COMMIT, before replay starts.
        const STOP_SET_COMMIT_AND_EXIT = 0x0000_0002;
        /// Cut in replay after the first target erase, before the write.
        const REPLAY_ERASE_AND_EXIT = 0x0000_0004;
        /// Cut in replay after the first target write.
        const REPLAY_WRITE_AND_EXIT = 0x0000_0008;
        /// Cut after all log entries are applied, before the master is
        /// reset to READY.
        const REPLAY_EXIT_BEFORE_CLOSE = 0x0000_0010;
        /// Orchestration hint for file-system-level test harnesses; the
        /// journal core ignores it.
        const REQUIRE_FILE_CLOSE = 0x0000_0020;
        /// Make `start`/`stop` no-ops while the direct-I/O path stays
        /// available, so harnesses can stage disk contents unjournaled.
        const SUSPEND_TRANSACTION = 0x0000_0040;
    }
}

/// The injection point that fired, passed to the power-cut callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrashPoint {
    /// [`TestFlags::STOP_SKIP_COMMIT`]
    StopSkipCommit,
    /// [`TestFlags::STOP_SET_COMMIT_AND_EXIT`]
    StopSetCommit,
    /// [`TestFlags::REPLAY_ERASE_AND_EXIT`]
    ReplayErase,
    /// [`TestFlags::REPLAY_WRITE_AND_EXIT`]
    ReplayWrite,
    /// [`TestFlags::REPLAY_EXIT_BEFORE_CLOSE`]
    ReplayBeforeClose,
}

/// Per-instance test state: the flag word plus the power-cut callback.
#[derive(Default)]
pub(crate) struct TestHooks {
    pub(crate) flags: TestFlags,
    pub(crate) on_power_cut: Option<Box<dyn Fn(CrashPoint) + Send>>,
}

impl TestHooks {
    /// True when `start`/`stop` are suspended.
    pub(crate) fn suspended(&self) -> bool {
        self.flags.contains(TestFlags::SUSPEND_TRANSACTION)
    }

    /// Fire the callback for `point` if `flag` is armed. The caller checks
    /// the log-non-empty precondition and returns early on `true`.
    pub(crate) fn power_cut(&self, flag: TestFlags, point: CrashPoint) -> bool {
        if !self.flags.contains(flag) {
            return false;
        }
        debug!("(jrnl power-cut test): simulated power loss at {:?}", point);
        if let Some(hook) = &self.on_power_cut {
            hook(point);
        }
        true
    }
}

impl core::fmt::Debug for TestHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TestHooks")
            .field("flags", &self.flags)
            .field("on_power_cut", &self.on_power_cut.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_cut_requires_flag() {
        let mut hooks = TestHooks::default();
        assert!(!hooks.power_cut(TestFlags::STOP_SKIP_COMMIT, CrashPoint::StopSkipCommit));

        hooks.flags = TestFlags::STOP_SKIP_COMMIT;
        assert!(hooks.power_cut(TestFlags::STOP_SKIP_COMMIT, CrashPoint::StopSkipCommit));
        assert!(!hooks.power_cut(TestFlags::REPLAY_ERASE_AND_EXIT, CrashPoint::ReplayErase));
    }

    #[test]
    fn test_suspend_flag() {
        let mut hooks = TestHooks::default();
        assert!(!hooks.suspended());
        hooks.flags = TestFlags::SUSPEND_TRANSACTION;
        assert!(hooks.suspended());
    }
}
