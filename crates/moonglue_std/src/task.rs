//! Task library
//!
//! Coroutine helpers backed by the state's run queue. Deferred and delayed
//! coroutines are resumed when the runner drains the queue after the main
//! chunk returns. `task.wait` parks a coroutine on the same queue; outside a
//! yieldable coroutine it blocks the calling thread instead.

use moonglue_core::scheduler::{self, thread_identity, LuaJob, RunQueue};
use moonglue_core::Result;
use mlua::{Function, Lua, MultiValue, Table, Thread, ThreadStatus};
use std::time::{Duration, Instant};
use tracing::error;

const WAIT_WRAPPER: &str = r#"
local park, block = ...
local isyieldable, running, yield = coroutine.isyieldable, coroutine.running, coroutine.yield
return function(seconds)
    if isyieldable() then
        park(running(), seconds)
        return yield()
    end
    return block(seconds)
end
"#;

/// Shortest time `task.wait` and `task.delay` will wait, in seconds.
pub const MIN_WAIT: f64 = 0.001;

/// Register the task module
pub fn register(lua: &Lua) -> Result<Table> {
    scheduler::install(lua);
    let task = lua.create_table()?;

    // task.wait(seconds?) -> elapsed
    let wait: Function = lua
        .load(WAIT_WRAPPER)
        .set_name("=task.wait")
        .call((lua.create_function(task_park)?, lua.create_function(task_wait)?))?;
    task.set("wait", wait)?;

    // task.spawn(fn, ...) -> thread
    task.set("spawn", lua.create_function(task_spawn)?)?;

    // task.defer(fn, ...) -> thread
    task.set("defer", lua.create_function(task_defer)?)?;

    // task.delay(seconds, fn, ...) -> thread
    task.set("delay", lua.create_function(task_delay)?)?;

    // task.cancel(thread)
    task.set("cancel", lua.create_function(task_cancel)?)?;

    Ok(task)
}

/// Clamp a script-supplied wait to [`MIN_WAIT`] and convert it.
pub fn wait_duration(seconds: Option<f64>) -> mlua::Result<Duration> {
    let seconds = seconds.unwrap_or(MIN_WAIT).max(MIN_WAIT);
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| mlua::Error::runtime(format!("Invalid wait time {}: {}", seconds, e)))
}

fn task_wait(_: &Lua, seconds: Option<f64>) -> mlua::Result<f64> {
    let duration = wait_duration(seconds)?;
    Ok(moonglue_core::sleep_blocking(duration).as_secs_f64())
}

/// Queue a wake-up for a coroutine that is about to yield.
fn task_park(lua: &Lua, (thread, seconds): (Thread, Option<f64>)) -> mlua::Result<()> {
    let duration = wait_duration(seconds)?;
    let job = LuaJob::wake(lua, &thread, Instant::now())?;
    scheduler::schedule(lua, duration, job)?;
    Ok(())
}

fn task_spawn(lua: &Lua, (function, args): (Function, MultiValue)) -> mlua::Result<Thread> {
    let thread = lua.create_thread(function)?;
    if let Err(e) = thread.resume::<MultiValue>(args) {
        error!("Error in spawned task: {}", e);
    }
    Ok(thread)
}

fn task_defer(lua: &Lua, (function, args): (Function, MultiValue)) -> mlua::Result<Thread> {
    let thread = lua.create_thread(function)?;
    let job = LuaJob::resume(lua, &thread, args)?;
    scheduler::schedule(lua, Duration::ZERO, job)?;
    Ok(thread)
}

fn task_delay(
    lua: &Lua,
    (seconds, function, args): (Option<f64>, Function, MultiValue),
) -> mlua::Result<Thread> {
    let delay = wait_duration(seconds)?;
    let thread = lua.create_thread(function)?;
    let job = LuaJob::resume(lua, &thread, args)?;
    scheduler::schedule(lua, delay, job)?;
    Ok(thread)
}

fn task_cancel(lua: &Lua, thread: Thread) -> mlua::Result<()> {
    let target = thread_identity(&thread);
    if let Some(mut queue) = lua.app_data_mut::<RunQueue>() {
        queue.0.cancel_where(|job| job.thread_id() == Some(target));
    }

    // A suspended coroutine could still be resumed by hand; close it so it
    // never continues.
    if thread.status() == ThreadStatus::Resumable {
        let close: Function = lua.globals().get::<Table>("coroutine")?.get("close")?;
        close.call::<MultiValue>(thread)?;
    }
    Ok(())
}
