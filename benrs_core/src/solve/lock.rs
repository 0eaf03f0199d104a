//! Locks around a solve: the host's lock released during the phases, and the process wide
//! solve lease
use std::sync::{Mutex, MutexGuard, TryLockError};

/// A lock held by the host while it calls into the solver
///
/// Long running phases run inside [`HostLock::release`], so other host threads can make
/// progress while the phase computes.
pub trait HostLock {
    /// Run `f` with the host lock released, re-acquiring it before returning
    fn release<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send;
}

/// Host without a lock of its own
#[derive(Debug, Default, Copy, Clone)]
pub struct NoHostLock;

impl HostLock for NoHostLock {
    fn release<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        f()
    }
}

/// The engine keeps process wide state, solves never overlap
static SOLVE_LEASE: Mutex<()> = Mutex::new(());

/// Wait for and take the solve lease
///
/// While another solve holds the lease, the wait happens with the host lock released, so the
/// holder can take the host lock back between its phases.
pub(crate) fn solve_lease<H: HostLock>(host: &H) -> MutexGuard<'static, ()> {
    loop {
        match SOLVE_LEASE.try_lock() {
            Ok(guard) => return guard,
            Err(TryLockError::Poisoned(err)) => return err.into_inner(),
            Err(TryLockError::WouldBlock) => host.release(|| drop(SOLVE_LEASE.lock())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::mpsc;
    use std::thread;

    static HOST: Mutex<()> = Mutex::new(());

    /// Host lock held by the calling thread except inside `release`
    struct Interpreter {
        guard: RefCell<Option<MutexGuard<'static, ()>>>,
    }

    impl Interpreter {
        fn enter() -> Self {
            Interpreter {
                guard: RefCell::new(Some(HOST.lock().unwrap())),
            }
        }
    }

    impl HostLock for Interpreter {
        fn release<T, F>(&self, f: F) -> T
        where
            F: FnOnce() -> T + Send,
            T: Send,
        {
            self.guard.borrow_mut().take();
            let result = f();
            *self.guard.borrow_mut() = Some(HOST.lock().unwrap());
            result
        }
    }

    #[test]
    fn lease_waits_without_host_lock() {
        let host = Interpreter::enter();
        let (leased, wait_for_lease) = mpsc::channel();
        let holder = thread::spawn(move || {
            let lease = solve_lease(&NoHostLock);
            leased.send(()).unwrap();
            // The holder needs the host lock before it can give the lease back
            let _host = HOST.lock().unwrap();
            drop(lease);
        });
        wait_for_lease.recv().unwrap();
        let lease = solve_lease(&host);
        drop(lease);
        assert!(host.guard.borrow().is_some());
        drop(host);
        holder.join().unwrap();
    }
}
