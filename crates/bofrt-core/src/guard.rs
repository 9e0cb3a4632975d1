//! Single-slot security principal override with guaranteed revert.
//!
//! A [`SecurityContext`] is either inactive or holds exactly one saved
//! principal. Activating while active is refused with
//! [`GuardError::AlreadyActive`]; nothing nests. Dropping an active context
//! (or a [`ScopedOverride`]) reverts it.

use std::fmt;

use crate::error::GuardError;

/// Platform primitives for the ambient principal of the current thread.
pub trait PrincipalBackend {
    type Token: Copy + fmt::Debug;
    /// Whatever is needed to restore the previous principal.
    type Saved;

    /// Switches the current thread to `token`, returning the prior principal.
    /// On `Err` the ambient principal must be unchanged.
    fn substitute(&mut self, token: Self::Token) -> Result<Self::Saved, String>;

    /// Restores a principal returned by `substitute`. There is no fallback
    /// below this, so implementations abort the process on failure.
    fn restore(&mut self, saved: Self::Saved);

    fn is_elevated(&self) -> bool;
}

pub struct SecurityContext<B: PrincipalBackend> {
    backend: B,
    saved: Option<B::Saved>,
}

impl<B: PrincipalBackend> SecurityContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            saved: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    pub fn is_elevated(&self) -> bool {
        self.backend.is_elevated()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn activate(&mut self, token: B::Token) -> Result<(), GuardError> {
        if self.saved.is_some() {
            log::warn!("nested principal override refused for token {token:?}");
            return Err(GuardError::AlreadyActive);
        }
        match self.backend.substitute(token) {
            Ok(saved) => {
                log::debug!("principal override active for token {token:?}");
                self.saved = Some(saved);
                Ok(())
            }
            Err(reason) => {
                log::debug!("principal override rejected for token {token:?}: {reason}");
                Err(GuardError::ContextSubstitutionRejected { reason })
            }
        }
    }

    /// Restores the principal saved by the last successful `activate`.
    /// No-op while inactive.
    pub fn revert(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.backend.restore(saved);
            log::debug!("principal override reverted");
        }
    }

    /// Activates `token` for the lifetime of the returned guard.
    pub fn scoped(&mut self, token: B::Token) -> Result<ScopedOverride<'_, B>, GuardError> {
        self.activate(token)?;
        Ok(ScopedOverride { ctx: self })
    }

    /// Runs `f` under `token`, reverting on every exit path including panics.
    pub fn run_as<R>(
        &mut self,
        token: B::Token,
        f: impl FnOnce(&SecurityContext<B>) -> R,
    ) -> Result<R, GuardError> {
        let scope = self.scoped(token)?;
        let out = f(&*scope.ctx);
        drop(scope);
        Ok(out)
    }
}

impl<B: PrincipalBackend> Drop for SecurityContext<B> {
    fn drop(&mut self) {
        self.revert();
    }
}

pub struct ScopedOverride<'a, B: PrincipalBackend> {
    ctx: &'a mut SecurityContext<B>,
}

impl<B: PrincipalBackend> ScopedOverride<'_, B> {
    pub fn is_elevated(&self) -> bool {
        self.ctx.is_elevated()
    }
}

impl<B: PrincipalBackend> Drop for ScopedOverride<'_, B> {
    fn drop(&mut self) {
        self.ctx.revert();
    }
}

/// Backend for targets without a per-thread principal primitive.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsupported;

impl PrincipalBackend for Unsupported {
    type Token = usize;
    type Saved = ();

    fn substitute(&mut self, _token: usize) -> Result<(), String> {
        Err("principal substitution is not supported on this target".to_string())
    }

    fn restore(&mut self, _saved: ()) {}

    fn is_elevated(&self) -> bool {
        false
    }
}

#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
pub use linux::ThreadEuid;

#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
mod linux {
    use super::PrincipalBackend;

    /// Per-thread effective uid. The raw `setresuid` syscall only changes the
    /// calling thread (libc's wrapper would broadcast to the whole process).
    /// A token is a uid; elevation means euid 0.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct ThreadEuid;

    fn set_thread_euid(euid: libc::uid_t) -> Result<(), std::io::Error> {
        let keep = -1 as libc::c_long;
        let rc = unsafe {
            libc::syscall(
                libc::SYS_setresuid,
                keep,
                libc::c_long::from(euid),
                keep,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    impl PrincipalBackend for ThreadEuid {
        type Token = usize;
        type Saved = libc::uid_t;

        fn substitute(&mut self, token: usize) -> Result<libc::uid_t, String> {
            let uid = libc::uid_t::try_from(token)
                .ok()
                .filter(|&uid| uid != libc::uid_t::MAX)
                .ok_or_else(|| format!("token {token:#x} is not a uid"))?;
            let prior = unsafe { libc::geteuid() };
            set_thread_euid(uid).map_err(|e| format!("setresuid({uid}): {e}"))?;
            Ok(prior)
        }

        fn restore(&mut self, saved: libc::uid_t) {
            if let Err(e) = set_thread_euid(saved) {
                log::error!("cannot restore euid {saved}: {e}");
                std::process::abort();
            }
        }

        fn is_elevated(&self) -> bool {
            unsafe { libc::geteuid() == 0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// In-memory principal: token 0 is the elevated identity, `u32::MAX` is
    /// rejected as an invalid handle.
    #[derive(Clone)]
    struct FakePrincipal {
        current: Rc<Cell<u32>>,
    }

    impl PrincipalBackend for FakePrincipal {
        type Token = u32;
        type Saved = u32;

        fn substitute(&mut self, token: u32) -> Result<u32, String> {
            if token == u32::MAX {
                return Err("invalid handle".into());
            }
            Ok(self.current.replace(token))
        }

        fn restore(&mut self, saved: u32) {
            self.current.set(saved);
        }

        fn is_elevated(&self) -> bool {
            self.current.get() == 0
        }
    }

    fn ctx(start: u32) -> (SecurityContext<FakePrincipal>, Rc<Cell<u32>>) {
        let current = Rc::new(Cell::new(start));
        let backend = FakePrincipal {
            current: Rc::clone(&current),
        };
        (SecurityContext::new(backend), current)
    }

    #[test]
    fn activate_then_revert_restores_elevation() {
        let (mut c, current) = ctx(1000);
        assert!(!c.is_elevated());
        c.activate(0).unwrap();
        assert!(c.is_active());
        assert!(c.is_elevated());
        c.revert();
        assert!(!c.is_active());
        assert!(!c.is_elevated());
        assert_eq!(current.get(), 1000);
    }

    #[test]
    fn rejected_activation_changes_nothing() {
        let (mut c, current) = ctx(0);
        let err = c.activate(u32::MAX).unwrap_err();
        assert!(matches!(err, GuardError::ContextSubstitutionRejected { .. }));
        assert!(!c.is_active());
        assert!(c.is_elevated());
        assert_eq!(current.get(), 0);
    }

    #[test]
    fn nested_activation_is_refused() {
        let (mut c, current) = ctx(5);
        c.activate(6).unwrap();
        assert_eq!(c.activate(7), Err(GuardError::AlreadyActive));
        assert_eq!(current.get(), 6);
        c.revert();
        assert_eq!(current.get(), 5);
        c.activate(7).unwrap();
        c.revert();
    }

    #[test]
    fn revert_while_inactive_is_a_no_op() {
        let (mut c, current) = ctx(3);
        c.revert();
        assert_eq!(current.get(), 3);
    }

    #[test]
    fn scope_reverts_on_drop() {
        let (mut c, current) = ctx(9);
        {
            let scope = c.scoped(0).unwrap();
            assert!(scope.is_elevated());
        }
        assert_eq!(current.get(), 9);
        assert!(!c.is_active());
    }

    #[test]
    fn run_as_reverts_after_panic() {
        let (mut c, current) = ctx(9);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            c.run_as(0, |_| panic!("privileged step failed")).unwrap();
        }));
        assert!(result.is_err());
        assert_eq!(current.get(), 9);
    }

    #[test]
    fn dropping_an_active_context_reverts() {
        let (mut c, current) = ctx(4);
        c.activate(0).unwrap();
        drop(c);
        assert_eq!(current.get(), 4);
    }

    #[test]
    fn unsupported_rejects_everything() {
        let mut c = SecurityContext::new(Unsupported);
        assert!(c.activate(1).is_err());
        assert!(!c.is_elevated());
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn thread_euid_round_trip_on_own_uid() {
        let own = unsafe { libc::geteuid() } as usize;
        let mut c = SecurityContext::new(ThreadEuid);
        let before = c.is_elevated();
        c.activate(own).unwrap();
        assert_eq!(c.is_elevated(), before);
        c.revert();
        assert_eq!(c.is_elevated(), before);
        assert!(c.activate(usize::MAX).is_err());
        assert_eq!(c.is_elevated(), before);
    }
}
