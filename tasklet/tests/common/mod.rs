//! A deterministic simulated-time scheduler for integration tests.
//!
//! Understands the requests the tests use: joins, timers, `first_of`
//! races and blocking-bridge handoffs. Inbound bridge jobs arrive over a
//! channel and run on the thread calling [`Sim::run`].

#![allow(dead_code)]

use tasklet::bridge::BlockingRequest;
use tasklet::task::{JoinRequest, Runnable, Step, TaskId};
use tasklet::{Enqueue, Failure, Job, Request, Resume, Sched, Schedule, suspend};

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Resolves once simulated time reaches `deadline`.
#[derive(Debug)]
pub struct Timer {
    pub deadline: Duration,
}

/// Resolves with the index of the first of its requests to resolve.
pub struct FirstOf(pub Vec<Request>);

enum Waiter {
    Direct(TaskId),
    Race {
        won: Rc<Cell<bool>>,
        index: usize,
        task: TaskId,
    },
}

enum Wake {
    Blocking(u64),
    Job(Job),
}

#[derive(Default)]
struct Inner {
    now: Duration,
    seq: u64,
    tasks: HashMap<TaskId, Box<dyn Runnable>>,
    ready: VecDeque<(TaskId, Resume)>,
    timers: BinaryHeap<Reverse<(Duration, u64)>>,
    timer_waiters: HashMap<u64, Waiter>,
    blocking: HashMap<u64, (Waiter, BlockingRequest)>,
    expected_jobs: usize,
    unscheduled: Vec<TaskId>,
    advances: usize,
}

pub struct Sim {
    me: Weak<Sim>,
    inner: RefCell<Inner>,
    tx: Sender<Wake>,
    rx: Receiver<Wake>,
    driver: ThreadId,
}

impl Sim {
    pub fn new() -> Rc<Self> {
        let (tx, rx) = mpsc::channel();
        Rc::new_cyclic(|me| Sim {
            me: me.clone(),
            inner: RefCell::new(Inner::default()),
            tx,
            rx,
            driver: thread::current().id(),
        })
    }

    pub fn sched(self: &Rc<Self>) -> Sched {
        self.clone()
    }

    /// Cross-thread handle for inbound bridge calls.
    pub fn remote(&self) -> Arc<Remote> {
        Arc::new(Remote {
            tx: self.tx.clone(),
            driver: self.driver,
        })
    }

    /// Makes [`run`](Sim::run) wait for `n` more inbound jobs.
    pub fn expect_jobs(&self, n: usize) {
        self.inner.borrow_mut().expected_jobs += n;
    }

    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Ids passed to `unschedule`, in call order.
    pub fn unscheduled(&self) -> Vec<TaskId> {
        self.inner.borrow().unscheduled.clone()
    }

    pub fn advances(&self) -> usize {
        self.inner.borrow().advances
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.inner.borrow().tasks.contains_key(&id)
    }

    /// Runs until no task can make progress.
    pub fn run(&self) {
        loop {
            let next = self.inner.borrow_mut().ready.pop_front();
            if let Some((id, resume)) = next {
                self.step(id, resume);
                continue;
            }

            if self.fire_next_timer() {
                continue;
            }

            if self.waiting_on_threads() {
                match self.rx.recv() {
                    Ok(wake) => self.handle_wake(wake),
                    Err(_) => break,
                }
                continue;
            }

            break;
        }
    }

    /// Moves the simulated clock without running anything.
    pub fn set_now(&self, now: Duration) {
        self.inner.borrow_mut().now = now;
    }

    fn step(&self, id: TaskId, resume: Resume) {
        let task = self.inner.borrow_mut().tasks.remove(&id);
        let Some(mut task) = task else {
            return;
        };

        self.inner.borrow_mut().advances += 1;
        match task.advance(resume) {
            Step::Completed => drop(task),
            Step::Suspended(request) => {
                self.inner.borrow_mut().tasks.insert(id, task);
                self.register(request, Waiter::Direct(id));
            }
        }
    }

    fn register(&self, request: Request, waiter: Waiter) {
        let request = match request.downcast::<JoinRequest>() {
            Ok(join) => {
                let me = self.me.clone();
                join.on_complete(move || {
                    if let Some(sim) = me.upgrade() {
                        sim.wake(waiter, Resume::with(()));
                    }
                });
                return;
            }
            Err(request) => request,
        };

        let request = match request.downcast::<Timer>() {
            Ok(timer) => {
                let mut inner = self.inner.borrow_mut();
                inner.seq += 1;
                let key = inner.seq;
                inner.timers.push(Reverse((timer.deadline, key)));
                inner.timer_waiters.insert(key, waiter);
                return;
            }
            Err(request) => request,
        };

        let request = match request.downcast::<FirstOf>() {
            Ok(FirstOf(requests)) => {
                let Waiter::Direct(task) = waiter else {
                    panic!("nested first_of is not supported");
                };

                let won = Rc::new(Cell::new(false));
                for (index, request) in requests.into_iter().enumerate() {
                    let won = won.clone();
                    self.register(request, Waiter::Race { won, index, task });
                }
                return;
            }
            Err(request) => request,
        };

        match request.downcast::<BlockingRequest>() {
            Ok(blocking) => {
                let key = {
                    let mut inner = self.inner.borrow_mut();
                    inner.seq += 1;
                    inner.seq
                };

                let tx = self.tx.clone();
                blocking.on_ready(move || {
                    let _ = tx.send(Wake::Blocking(key));
                });
                self.inner.borrow_mut().blocking.insert(key, (waiter, blocking));
            }
            Err(request) => panic!("unsupported request {}", request.kind()),
        }
    }

    fn wake(&self, waiter: Waiter, resume: Resume) {
        let mut inner = self.inner.borrow_mut();
        match waiter {
            Waiter::Direct(id) => inner.ready.push_back((id, resume)),
            Waiter::Race { won, index, task } => {
                if !won.replace(true) {
                    inner.ready.push_back((task, Resume::with(index)));
                }
            }
        }
    }

    fn fire_next_timer(&self) -> bool {
        let waiter = {
            let mut inner = self.inner.borrow_mut();
            let Some(Reverse((deadline, key))) = inner.timers.pop() else {
                return false;
            };

            inner.now = inner.now.max(deadline);
            inner.timer_waiters.remove(&key)
        };

        if let Some(waiter) = waiter {
            self.wake(waiter, Resume::with(()));
        }
        true
    }

    fn waiting_on_threads(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.blocking.is_empty() || inner.expected_jobs > 0
    }

    fn handle_wake(&self, wake: Wake) {
        match wake {
            Wake::Blocking(key) => {
                let entry = self.inner.borrow_mut().blocking.remove(&key);
                if let Some((waiter, blocking)) = entry {
                    if let Some(resume) = blocking.take() {
                        self.wake(waiter, resume);
                    }
                }
            }
            Wake::Job(job) => {
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.expected_jobs = inner.expected_jobs.saturating_sub(1);
                }

                if let Some(sim) = self.me.upgrade() {
                    let sched: Sched = sim;
                    job(&sched);
                }
            }
        }
    }
}

impl Schedule for Sim {
    fn unschedule(&self, id: TaskId) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner.unscheduled.push(id);
            inner.tasks.remove(&id)
        };

        // Dropping a task may kill others, which calls back in here.
        drop(removed);
    }

    fn start(&self, task: Box<dyn Runnable>) {
        let mut inner = self.inner.borrow_mut();
        let id = task.id();
        inner.tasks.insert(id, task);
        inner.ready.push_back((id, Resume::start()));
    }

    fn sim_time(&self) -> Duration {
        self.inner.borrow().now
    }

    fn timer(&self, after: Duration) -> Request {
        Request::new(Timer {
            deadline: self.now() + after,
        })
    }

    fn first_of(&self, requests: Vec<Request>) -> Request {
        Request::new(FirstOf(requests))
    }
}

/// [`Enqueue`] side of a [`Sim`], usable from any thread.
pub struct Remote {
    tx: Sender<Wake>,
    driver: ThreadId,
}

impl Enqueue for Remote {
    fn enqueue(&self, job: Job) -> Result<(), Job> {
        self.tx.send(Wake::Job(job)).map_err(|err| match err.0 {
            Wake::Job(job) => job,
            Wake::Blocking(_) => unreachable!(),
        })
    }

    fn on_driver_thread(&self) -> bool {
        thread::current().id() == self.driver
    }
}

/// An [`Enqueue`] whose scheduler is gone.
pub struct Closed;

impl Enqueue for Closed {
    fn enqueue(&self, job: Job) -> Result<(), Job> {
        Err(job)
    }

    fn on_driver_thread(&self) -> bool {
        false
    }
}

/// Shorthand for nanoseconds of simulated time.
pub fn ns(n: u64) -> Duration {
    Duration::from_nanos(n)
}

/// Suspends the current task for `after` of simulated time.
pub async fn sleep(sched: Sched, after: Duration) -> Result<(), Failure> {
    suspend::<()>(sched.timer(after)).await
}
