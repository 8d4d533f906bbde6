//! Manually pumped task scheduler
//!
//! Functions queued here only run when the script calls
//! `taskscheduler.run_tasks()`. The queue is separate from the run queue used
//! by `task`.

use moonglue_core::scheduler::{LuaJob, Scheduler};
use moonglue_core::Result;
use mlua::{Function, Lua, Table};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Per-state queue for `taskscheduler`.
#[derive(Debug, Default)]
struct TaskQueue(Scheduler<LuaJob>);

/// Register the taskscheduler module
pub fn register(lua: &Lua) -> Result<Table> {
    if lua.app_data_ref::<TaskQueue>().is_none() {
        lua.set_app_data(TaskQueue::default());
    }

    let taskscheduler = lua.create_table()?;

    // taskscheduler.schedule_task(fn, delay_seconds) -> id
    taskscheduler.set("schedule_task", lua.create_function(schedule_task)?)?;

    // taskscheduler.run_tasks() -> count
    taskscheduler.set("run_tasks", lua.create_function(run_tasks)?)?;

    // taskscheduler.cancel_task(id) -> boolean
    taskscheduler.set("cancel_task", lua.create_function(cancel_task)?)?;

    // taskscheduler.pending() -> integer
    taskscheduler.set("pending", lua.create_function(pending)?)?;

    Ok(taskscheduler)
}

fn with_queue<T>(lua: &Lua, f: impl FnOnce(&mut Scheduler<LuaJob>) -> T) -> mlua::Result<T> {
    let mut queue = lua
        .app_data_mut::<TaskQueue>()
        .ok_or_else(|| mlua::Error::runtime("Task scheduler not initialized"))?;
    Ok(f(&mut queue.0))
}

fn schedule_task(lua: &Lua, (function, delay): (Function, f64)) -> mlua::Result<u64> {
    let delay = Duration::try_from_secs_f64(delay.max(0.0))
        .map_err(|e| mlua::Error::runtime(format!("Invalid delay {}: {}", delay, e)))?;
    let job = LuaJob::call(lua, function)?;
    with_queue(lua, |queue| queue.schedule(delay, job))
}

fn run_tasks(lua: &Lua, _: ()) -> mlua::Result<usize> {
    // Taken out first so tasks may schedule or cancel while running.
    let due = with_queue(lua, |queue| queue.take_due(Instant::now()))?;
    let count = due.len();
    for scheduled in due {
        debug!("Running scheduled task {}", scheduled.id);
        if let Err(e) = scheduled.job.run(lua) {
            error!("Error running scheduled task: {}", e);
        }
    }
    Ok(count)
}

fn cancel_task(lua: &Lua, id: u64) -> mlua::Result<bool> {
    with_queue(lua, |queue| queue.cancel(id))
}

fn pending(lua: &Lua, _: ()) -> mlua::Result<usize> {
    with_queue(lua, |queue| queue.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Lua {
        let lua = Lua::new();
        lua.globals().set("taskscheduler", register(&lua).unwrap()).unwrap();
        lua
    }

    #[test]
    fn test_runs_only_due_tasks() {
        let lua = setup();
        let (first, pending): (usize, usize) = lua
            .load(
                r#"
                hits = {}
                taskscheduler.schedule_task(function() hits[#hits + 1] = "now" end, 0)
                taskscheduler.schedule_task(function() hits[#hits + 1] = "later" end, 60)
                return taskscheduler.run_tasks(), taskscheduler.pending()
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(pending, 1);
        let hits: String = lua.load("return table.concat(hits, ',')").eval().unwrap();
        assert_eq!(hits, "now");
    }

    #[test]
    fn test_due_order() {
        let lua = setup();
        lua.load(
            r#"
            order = {}
            taskscheduler.schedule_task(function() order[#order + 1] = "b" end, 0.02)
            taskscheduler.schedule_task(function() order[#order + 1] = "a" end, 0.01)
        "#,
        )
        .exec()
        .unwrap();
        std::thread::sleep(Duration::from_millis(40));
        let count: usize = lua.load("return taskscheduler.run_tasks()").eval().unwrap();
        assert_eq!(count, 2);
        let order: String = lua.load("return table.concat(order, ',')").eval().unwrap();
        assert_eq!(order, "a,b");
    }

    #[test]
    fn test_failing_task_is_removed() {
        let lua = setup();
        let (ran, pending): (usize, usize) = lua
            .load(
                r#"
                taskscheduler.schedule_task(function() error("bad task") end, 0)
                return taskscheduler.run_tasks(), taskscheduler.pending()
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!((ran, pending), (1, 0));
    }

    #[test]
    fn test_cancel_task() {
        let lua = setup();
        let (cancelled, again, ran): (bool, bool, usize) = lua
            .load(
                r#"
                local id = taskscheduler.schedule_task(function() end, 0)
                local cancelled = taskscheduler.cancel_task(id)
                return cancelled, taskscheduler.cancel_task(id), taskscheduler.run_tasks()
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!((cancelled, again, ran), (true, false, 0));
    }

    #[test]
    fn test_non_function_rejected() {
        let lua = setup();
        assert!(lua.load("taskscheduler.schedule_task(42, 0)").exec().is_err());
    }
}
