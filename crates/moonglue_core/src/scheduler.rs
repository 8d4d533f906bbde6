//! Delayed job queue
//!
//! A list of jobs kept sorted by due time. Jobs with equal due times keep
//! their scheduling order. The queue is stored per Lua state as app data;
//! [`run_due`] and [`run_until_idle`] pop due jobs and execute them.

use crate::Result;
use mlua::{Function, Lua, MultiValue, RegistryKey, Table, Thread, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// A queued entry.
#[derive(Debug)]
pub struct ScheduledJob<J> {
    pub id: u64,
    pub due: Instant,
    pub job: J,
}

/// Jobs sorted by due time.
#[derive(Debug)]
pub struct Scheduler<J> {
    next_id: u64,
    queue: Vec<ScheduledJob<J>>,
}

impl<J> Default for Scheduler<J> {
    fn default() -> Self {
        Self {
            next_id: 1,
            queue: Vec::new(),
        }
    }
}

impl<J> Scheduler<J> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` to become due after `delay`. Returns its id.
    pub fn schedule(&mut self, delay: Duration, job: J) -> u64 {
        self.schedule_at(Instant::now() + delay, job)
    }

    /// Queue `job` to become due at `due`. Returns its id.
    pub fn schedule_at(&mut self, due: Instant, job: J) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let position = self.queue.partition_point(|queued| queued.due <= due);
        self.queue.insert(position, ScheduledJob { id, due, job });
        id
    }

    /// Remove the job with `id`. Returns whether it was still queued.
    pub fn cancel(&mut self, id: u64) -> bool {
        let before = self.queue.len();
        self.queue.retain(|queued| queued.id != id);
        self.queue.len() != before
    }

    /// Remove every job matching `predicate`. Returns how many were removed.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&J) -> bool) -> usize {
        let before = self.queue.len();
        self.queue.retain(|queued| !predicate(&queued.job));
        before - self.queue.len()
    }

    /// Pop every job due at or before `now`, in due order.
    pub fn take_due(&mut self, now: Instant) -> Vec<ScheduledJob<J>> {
        let split = self.queue.partition_point(|queued| queued.due <= now);
        self.queue.drain(..split).collect()
    }

    /// Due time of the earliest queued job.
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.first().map(|queued| queued.due)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Lua jobs
// ---------------------------------------------------------------------------

/// Work a Lua scheduler can run.
#[derive(Debug)]
pub enum LuaJob {
    /// Call a function with no arguments.
    Call(RegistryKey),
    /// Resume a coroutine with stored arguments.
    Resume {
        thread: RegistryKey,
        /// Identity of the coroutine, for cancellation.
        thread_id: usize,
        /// Sequence of arguments, with `count` holding trailing nils.
        args: RegistryKey,
        count: usize,
    },
    /// Resume a coroutine parked by a wait, passing the seconds since `since`.
    Wake {
        thread: RegistryKey,
        thread_id: usize,
        since: Instant,
    },
}

impl LuaJob {
    pub fn call(lua: &Lua, function: Function) -> mlua::Result<Self> {
        Ok(LuaJob::Call(lua.create_registry_value(function)?))
    }

    pub fn resume(lua: &Lua, thread: &Thread, args: MultiValue) -> mlua::Result<Self> {
        let count = args.len();
        let stored = lua.create_table()?;
        for (i, arg) in args.into_iter().enumerate() {
            stored.raw_set(i + 1, arg)?;
        }
        Ok(LuaJob::Resume {
            thread: lua.create_registry_value(thread.clone())?,
            thread_id: thread_identity(thread),
            args: lua.create_registry_value(stored)?,
            count,
        })
    }

    pub fn wake(lua: &Lua, thread: &Thread, since: Instant) -> mlua::Result<Self> {
        Ok(LuaJob::Wake {
            thread: lua.create_registry_value(thread.clone())?,
            thread_id: thread_identity(thread),
            since,
        })
    }

    pub fn thread_id(&self) -> Option<usize> {
        match self {
            LuaJob::Call(_) => None,
            LuaJob::Resume { thread_id, .. } | LuaJob::Wake { thread_id, .. } => Some(*thread_id),
        }
    }

    /// Run the job. Script errors are returned, not raised.
    pub fn run(self, lua: &Lua) -> mlua::Result<()> {
        match self {
            LuaJob::Call(key) => {
                let function: Function = lua.registry_value(&key)?;
                lua.remove_registry_value(key)?;
                function.call::<()>(())
            }
            LuaJob::Resume { thread, args, count, .. } => {
                let coroutine: Thread = lua.registry_value(&thread)?;
                let stored: Table = lua.registry_value(&args)?;
                lua.remove_registry_value(thread)?;
                lua.remove_registry_value(args)?;
                let mut values = MultiValue::new();
                for i in 1..=count {
                    values.push_back(stored.raw_get::<Value>(i)?);
                }
                coroutine.resume::<MultiValue>(values).map(|_| ())
            }
            LuaJob::Wake { thread, since, .. } => {
                let coroutine: Thread = lua.registry_value(&thread)?;
                lua.remove_registry_value(thread)?;
                coroutine
                    .resume::<MultiValue>(since.elapsed().as_secs_f64())
                    .map(|_| ())
            }
        }
    }
}

/// Identity of a coroutine, stable while it is alive.
pub fn thread_identity(thread: &Thread) -> usize {
    Value::Thread(thread.clone()).to_pointer() as usize
}

/// The per-state queue drained by the script runner.
#[derive(Debug, Default)]
pub struct RunQueue(pub Scheduler<LuaJob>);

/// Install an empty [`RunQueue`] on `lua` if none exists yet.
pub fn install(lua: &Lua) {
    if lua.app_data_ref::<RunQueue>().is_none() {
        lua.set_app_data(RunQueue::default());
    }
}

/// Queue `job` on the state's run queue.
pub fn schedule(lua: &Lua, delay: Duration, job: LuaJob) -> mlua::Result<u64> {
    install(lua);
    let mut queue = lua
        .app_data_mut::<RunQueue>()
        .ok_or_else(|| mlua::Error::runtime("Run queue not initialized"))?;
    Ok(queue.0.schedule(delay, job))
}

/// Run every job that is due now. Returns how many ran.
pub fn run_due(lua: &Lua) -> Result<usize> {
    let due = match lua.app_data_mut::<RunQueue>() {
        Some(mut queue) => queue.0.take_due(Instant::now()),
        None => return Ok(0),
    };
    let count = due.len();
    for scheduled in due {
        debug!("Running queued job {}", scheduled.id);
        if let Err(e) = scheduled.job.run(lua) {
            error!("Error running queued task: {}", e);
        }
    }
    Ok(count)
}

/// Drain the run queue, sleeping until each job is due.
pub fn run_until_idle(lua: &Lua) -> Result<()> {
    loop {
        let next = match lua.app_data_ref::<RunQueue>() {
            Some(queue) => queue.0.next_due(),
            None => None,
        };
        let Some(due) = next else {
            return Ok(());
        };
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
        run_due(lua)?;
    }
}
