//! The event loop primitive: file-descriptor watchers and timers.
//!
//! A single-threaded dispatcher built on `poll(2)`. [`FdWatcher`]s and
//! [`Timer`]s are RAII handles: constructing one registers it with the
//! thread's dispatcher, dropping it detaches. One call to
//! [`dispatch_next_events`] performs one tick:
//!
//! 1. build a poll set from every watcher (read + priority read),
//! 2. poll, with the earliest timer deadline as the timeout (clamped to
//!    32-bit milliseconds; unlimited when no timer is armed),
//! 3. *after* polling, drain the forced-fd queue; signal handlers push fds
//!    through a self-pipe via [`force_fd`], so the write both unblocks the
//!    poll and marks the fd for dispatch,
//! 4. dispatch every ready or forced watcher, in registration order,
//! 5. dispatch every due timer, resetting its deadline before the callback
//!    runs; the callback may reschedule through its control handle.
//!
//! Draining the queue after the poll guarantees that a signal arriving
//! between poll-set construction and the `poll` call is serviced on the very
//! next wake. [`force_fd`] is async-signal-safe: it performs a single
//! `write(2)` to the self-pipe and touches nothing else.
//!
//! Callbacks may freely create or destroy watchers and timers, including the
//! one currently being dispatched: the dispatcher takes a callback out of
//! the registry before invoking it, so no registry borrow is held across
//! user code.
//!
//! The dispatcher is per-thread, which under the core's single-threaded
//! contract means per-process. [`force_fd`] targets the calling thread's
//! dispatcher; signals delivered to a single-threaded process land on that
//! same thread.

use std::cell::{Cell, RefCell};
use std::os::unix::io::RawFd;
use std::time::Instant;
use tracing::trace;

/// Callback invoked when a watched fd becomes ready (or is forced).
pub type FdCallback = Box<dyn FnMut(RawFd)>;

/// Callback invoked when a timer's deadline passes.
pub type TimerCallback = Box<dyn FnMut(&mut TimerControl)>;

struct FdEntry {
    id: u64,
    fd: RawFd,
    callback: Option<FdCallback>,
}

struct TimerEntry {
    id: u64,
    deadline: Option<Instant>,
    callback: Option<TimerCallback>,
}

struct EventLoopState {
    next_id: u64,
    watchers: Vec<FdEntry>,
    timers: Vec<TimerEntry>,
    pipe_read: RawFd,
}

thread_local! {
    // Write end of the self-pipe, published for signal handlers. Const-
    // initialized so reading it never allocates; the only thing a handler
    // may do is read it and issue a single write(2).
    static FORCE_PIPE_WRITE: Cell<RawFd> = const { Cell::new(-1) };
}

impl EventLoopState {
    fn new() -> Self {
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0, "self-pipe creation failed");
        for fd in fds {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }
        FORCE_PIPE_WRITE.with(|w| w.set(fds[1]));
        Self {
            next_id: 1,
            watchers: Vec::new(),
            timers: Vec::new(),
            pipe_read: fds[0],
        }
    }
}

thread_local! {
    static EVENT_LOOP: RefCell<EventLoopState> = RefCell::new(EventLoopState::new());
}

/// Mark `fd` as ready regardless of its poll state, waking the poll.
///
/// Async-signal-safe: performs one `write(2)` on the self-pipe. Intended to
/// be called from signal handlers; the fd is dispatched on the next tick
/// even if the signal arrived between poll-set construction and the poll.
pub fn force_fd(fd: RawFd) {
    let Ok(pipe_write) = FORCE_PIPE_WRITE.try_with(Cell::get) else {
        return;
    };
    if pipe_write >= 0 {
        let bytes = fd.to_ne_bytes();
        unsafe {
            libc::write(pipe_write, bytes.as_ptr() as *const libc::c_void, 4);
        }
    }
}

/// A registered file-descriptor watcher. Dropping it detaches from the
/// dispatcher on every exit path.
pub struct FdWatcher {
    id: u64,
    fd: RawFd,
}

impl FdWatcher {
    /// Watch `fd` for readability; `callback` runs on each ready tick.
    pub fn new(fd: RawFd, callback: impl FnMut(RawFd) + 'static) -> Self {
        let id = EVENT_LOOP.with(|el| {
            let mut el = el.borrow_mut();
            let id = el.next_id;
            el.next_id += 1;
            el.watchers.push(FdEntry {
                id,
                fd,
                callback: Some(Box::new(callback)),
            });
            id
        });
        Self { id, fd }
    }

    /// The watched descriptor.
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FdWatcher {
    fn drop(&mut self) {
        let _ = EVENT_LOOP.try_with(|el| {
            el.borrow_mut().watchers.retain(|w| w.id != self.id);
        });
    }
}

/// Passed to a timer callback; lets it reschedule itself.
pub struct TimerControl {
    next: Option<Instant>,
}

impl TimerControl {
    /// Arm the timer for another firing at `deadline`.
    pub fn reschedule(&mut self, deadline: Instant) {
        self.next = Some(deadline);
    }
}

/// A registered timer. One-shot by default: the deadline is cleared before
/// the callback runs, and stays cleared unless the callback reschedules.
/// Dropping the handle cancels the timer.
pub struct Timer {
    id: u64,
}

impl Timer {
    /// Arm a timer firing at `deadline`.
    pub fn new(deadline: Instant, callback: impl FnMut(&mut TimerControl) + 'static) -> Self {
        let id = EVENT_LOOP.with(|el| {
            let mut el = el.borrow_mut();
            let id = el.next_id;
            el.next_id += 1;
            el.timers.push(TimerEntry {
                id,
                deadline: Some(deadline),
                callback: Some(Box::new(callback)),
            });
            id
        });
        Self { id }
    }

    /// Re-arm this timer for `deadline`.
    pub fn set_next(&self, deadline: Instant) {
        EVENT_LOOP.with(|el| {
            if let Some(timer) = el
                .borrow_mut()
                .timers
                .iter_mut()
                .find(|t| t.id == self.id)
            {
                timer.deadline = Some(deadline);
            }
        });
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let _ = EVENT_LOOP.try_with(|el| {
            el.borrow_mut().timers.retain(|t| t.id != self.id);
        });
    }
}

/// Run one tick of the event loop: poll, then dispatch ready fds and due
/// timers.
pub fn dispatch_next_events() {
    let (mut pollfds, watched, pipe_read) = EVENT_LOOP.with(|el| {
        let el = el.borrow();
        let mut pollfds: Vec<libc::pollfd> = Vec::with_capacity(el.watchers.len() + 1);
        pollfds.push(libc::pollfd {
            fd: el.pipe_read,
            events: libc::POLLIN,
            revents: 0,
        });
        let mut watched: Vec<(u64, RawFd)> = Vec::with_capacity(el.watchers.len());
        for watcher in &el.watchers {
            pollfds.push(libc::pollfd {
                fd: watcher.fd,
                events: libc::POLLIN | libc::POLLPRI,
                revents: 0,
            });
            watched.push((watcher.id, watcher.fd));
        }
        (pollfds, watched, el.pipe_read)
    });

    let timeout_ms: libc::c_int = EVENT_LOOP.with(|el| {
        el.borrow()
            .timers
            .iter()
            .filter_map(|t| t.deadline)
            .min()
            .map(|deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .as_millis()
                    .min(libc::c_int::MAX as u128) as libc::c_int
            })
            .unwrap_or(-1)
    });

    // EINTR lands here as an error return; forced fds pushed by the
    // interrupting signal handler are picked up just below.
    unsafe {
        libc::poll(
            pollfds.as_mut_ptr(),
            pollfds.len() as libc::nfds_t,
            timeout_ms,
        );
    }

    // Gather forced fds *after* the poll, so a signal arriving at any point
    // before or during it is serviced now rather than next tick.
    let mut forced: Vec<RawFd> = Vec::new();
    loop {
        let mut bytes = [0u8; 4];
        let n = unsafe { libc::read(pipe_read, bytes.as_mut_ptr() as *mut libc::c_void, 4) };
        if n != 4 {
            break;
        }
        forced.push(RawFd::from_ne_bytes(bytes));
    }

    let mut dispatched = 0usize;
    for (index, &(id, fd)) in watched.iter().enumerate() {
        let ready = pollfds[index + 1].revents != 0 || forced.contains(&fd);
        if !ready {
            continue;
        }
        run_fd_callback(id, fd);
        dispatched += 1;
    }

    let now = Instant::now();
    let due: Vec<u64> = EVENT_LOOP.with(|el| {
        el.borrow()
            .timers
            .iter()
            .filter(|t| t.deadline.is_some_and(|d| d <= now))
            .map(|t| t.id)
            .collect()
    });
    for id in &due {
        run_timer_callback(*id);
    }

    if dispatched > 0 || !due.is_empty() {
        trace!(fds = dispatched, timers = due.len(), "dispatched events");
    }
}

fn run_fd_callback(id: u64, fd: RawFd) {
    // Take the callback out so the callback itself may add or remove
    // watchers (including this one) without re-entering the registry.
    let callback = EVENT_LOOP.with(|el| {
        el.borrow_mut()
            .watchers
            .iter_mut()
            .find(|w| w.id == id)
            .and_then(|w| w.callback.take())
    });
    let Some(mut callback) = callback else {
        return;
    };
    callback(fd);
    EVENT_LOOP.with(|el| {
        // Put it back unless the callback destroyed its own watcher.
        if let Some(watcher) = el.borrow_mut().watchers.iter_mut().find(|w| w.id == id) {
            watcher.callback = Some(callback);
        }
    });
}

fn run_timer_callback(id: u64) {
    let callback = EVENT_LOOP.with(|el| {
        let mut el = el.borrow_mut();
        let Some(timer) = el.timers.iter_mut().find(|t| t.id == id) else {
            return None;
        };
        // One-shot unless rescheduled: clear the deadline before running.
        timer.deadline = None;
        timer.callback.take()
    });
    let Some(mut callback) = callback else {
        return;
    };
    let mut control = TimerControl { next: None };
    callback(&mut control);
    EVENT_LOOP.with(|el| {
        if let Some(timer) = el.borrow_mut().timers.iter_mut().find(|t| t.id == id) {
            timer.callback = Some(callback);
            if let Some(deadline) = control.next {
                timer.deadline = Some(deadline);
            }
        }
    });
}
