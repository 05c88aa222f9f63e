mod common;

use common::{assert_consistent, body};
use taskcore::config::{Config, DEFAULT_LEVEL, MAX_LEVEL};
use taskcore::message::{Message, MessageKind};
use taskcore::task::context::TaskContext;
use taskcore::task::manager::{Switch, TaskManager, WaitFinish};
use taskcore::{TaskError, TaskId};

fn boot() -> TaskId {
    TaskId::from(1)
}

/// Manager whose boot task has gone to sleep, leaving `levels.len()` fresh
/// tasks runnable at the given levels.
fn with_tasks(levels: &[usize]) -> (TaskManager, Vec<TaskId>) {
    let mut mgr = TaskManager::new(Config::default());
    let ids: Vec<TaskId> = levels
        .iter()
        .map(|&level| mgr.spawn(body, 0, Some(level)).unwrap())
        .collect();
    mgr.sleep(boot()).unwrap();
    assert_consistent(&mgr);
    (mgr, ids)
}

fn rotate(mgr: &mut TaskManager) -> TaskId {
    mgr.switch_task(&TaskContext::zeroed());
    assert_consistent(mgr);
    mgr.current_task()
}

fn mouse(x: i32) -> Message {
    Message::new(MessageKind::MouseMove {
        x,
        y: 0,
        dx: 0,
        dy: 0,
        buttons: 0,
    })
}

#[test]
fn round_robin_visits_each_task_evenly() {
    let (mut mgr, ids) = with_tasks(&[1, 1, 1]);
    let n = 10;
    let visits: Vec<TaskId> = (0..n).map(|_| rotate(&mut mgr)).collect();

    for id in &ids {
        let count = visits.iter().filter(|&v| v == id).count();
        assert!(count == n / 3 || count == n.div_ceil(3), "{} ran {} times", id, count);
    }
    assert_eq!(&visits[..3], &[ids[1], ids[2], ids[0]]);
}

#[test]
fn timer_rotation_saves_interrupted_context() {
    let (mut mgr, ids) = with_tasks(&[2, 2]);
    let mut saved = TaskContext::zeroed();
    saved.rip = 0xdead_beef;
    saved.rax = 42;

    assert_eq!(mgr.switch_task(&saved), Some(ids[1]));
    let ctx = mgr.task(ids[0]).unwrap().context();
    assert_eq!((ctx.rip, ctx.rax), (0xdead_beef, 42));
}

#[test]
fn single_runnable_task_keeps_running() {
    let (mut mgr, ids) = with_tasks(&[2, 0]);
    for _ in 0..5 {
        assert_eq!(mgr.switch_task(&TaskContext::zeroed()), None);
        assert_eq!(mgr.current_task(), ids[0]);
    }
}

#[test]
fn higher_level_always_wins() {
    let mut mgr = TaskManager::new(Config::default());
    let low = mgr.spawn(body, 0, Some(0)).unwrap();
    let mid = mgr.spawn(body, 0, Some(2)).unwrap();
    let high = mgr.spawn(body, 0, Some(MAX_LEVEL)).unwrap();
    assert_consistent(&mgr);

    for _ in 0..8 {
        let current = rotate(&mut mgr);
        assert!(current == boot() || current == high);
        assert_ne!(current, low);
        assert_ne!(current, mid);
    }
}

#[test]
fn waking_low_task_does_not_preempt() {
    let (mut mgr, ids) = with_tasks(&[MAX_LEVEL]);
    let low = mgr.new_task();
    mgr.wakeup(low, Some(0)).unwrap();
    assert!(!mgr.level_change_pending());
    assert_eq!(rotate(&mut mgr), ids[0]);
}

#[test]
fn waking_higher_task_takes_over_at_next_rotation() {
    let (mut mgr, ids) = with_tasks(&[1]);
    let high = mgr.new_task();
    mgr.wakeup(high, Some(2)).unwrap();

    assert!(mgr.level_change_pending());
    assert_eq!(mgr.current_task(), ids[0]);
    assert_consistent(&mgr);

    assert_eq!(mgr.switch_task(&TaskContext::zeroed()), Some(high));
    assert_eq!(mgr.current_level(), 2);
    assert_consistent(&mgr);
}

#[test]
fn level_drops_when_top_level_empties() {
    let (mut mgr, ids) = with_tasks(&[2, 0]);
    let switch = mgr.sleep(ids[0]).unwrap();
    assert_eq!(
        switch,
        Some(Switch {
            next: ids[1],
            current: ids[0]
        })
    );
    assert_eq!(mgr.current_level(), 0);
    assert_consistent(&mgr);
}

#[test]
fn executing_task_raises_itself_without_switch() {
    let (mut mgr, ids) = with_tasks(&[1, 1]);
    mgr.wakeup(ids[0], Some(MAX_LEVEL)).unwrap();

    assert_eq!(mgr.current_task(), ids[0]);
    assert_eq!(mgr.current_level(), MAX_LEVEL);
    assert_eq!(mgr.run_queue(MAX_LEVEL).next(), Some(ids[0]));
    assert_consistent(&mgr);
}

#[test]
fn sleep_then_wakeup_does_not_duplicate() {
    let (mut mgr, ids) = with_tasks(&[1, 2]);
    assert_eq!(mgr.sleep(ids[0]).unwrap(), None);
    assert_consistent(&mgr);

    mgr.wakeup(ids[0], None).unwrap();
    mgr.wakeup(ids[0], None).unwrap();
    assert_eq!(mgr.run_queue(1).collect::<Vec<_>>(), [ids[0]]);
    assert_consistent(&mgr);

    mgr.sleep(ids[1]).unwrap();
    assert_eq!(mgr.current_task(), ids[0]);
    assert_consistent(&mgr);
}

#[test]
fn sleeping_current_hands_over_to_peer() {
    let mut mgr = TaskManager::new(Config::default());
    let a = mgr.new_task();
    let b = mgr.new_task();
    mgr.wakeup(a, Some(1)).unwrap();
    mgr.wakeup(b, Some(1)).unwrap();
    mgr.sleep(boot()).unwrap();
    assert_eq!(mgr.current_task(), a);

    let switch = mgr.sleep(a).unwrap();
    assert_eq!(switch, Some(Switch { next: b, current: a }));
    assert_eq!(mgr.current_task(), b);
    assert!(!mgr.task(a).unwrap().is_running());
    assert_consistent(&mgr);
}

#[test]
fn messages_arrive_in_send_order_and_wake_receiver() {
    let mut mgr = TaskManager::new(Config::default());
    let rx = mgr.new_task();

    for x in 1..=3 {
        mgr.send_message(rx, mouse(x).from_task(boot())).unwrap();
    }
    let task = mgr.task(rx).unwrap();
    assert!(task.is_running());
    assert_eq!(task.level(), DEFAULT_LEVEL);
    assert_consistent(&mgr);

    let received: Vec<Message> = (0..3)
        .map(|_| mgr.receive_message(rx).unwrap().unwrap())
        .collect();
    assert_eq!(received, [mouse(1), mouse(2), mouse(3)].map(|m| m.from_task(boot())));
    assert_eq!(mgr.receive_message(rx), Ok(None));
}

#[test]
fn unknown_ids_report_no_such_task() {
    let mut mgr = TaskManager::new(Config::default());
    let ghost = TaskId::from(99);

    assert_eq!(mgr.wakeup(ghost, None), Err(TaskError::NoSuchTask));
    assert_eq!(mgr.sleep(ghost), Err(TaskError::NoSuchTask));
    assert_eq!(mgr.send_message(ghost, mouse(0)), Err(TaskError::NoSuchTask));
    assert_eq!(mgr.receive_message(ghost), Err(TaskError::NoSuchTask));
    assert_eq!(mgr.wait_finish(boot(), ghost), Err(TaskError::NoSuchTask));
    assert_eq!(
        mgr.init_context(ghost, body, 0, 0),
        Err(TaskError::NoSuchTask)
    );
    assert_consistent(&mgr);
}

#[test]
fn finish_wakes_waiter_with_exit_code_once() {
    let mut mgr = TaskManager::new(Config::default());
    let ids: Vec<TaskId> = (0..8).map(|_| mgr.new_task()).collect();
    let (target, waiter) = (TaskId::from(7), TaskId::from(9));
    assert_eq!((ids[5], ids[7]), (target, waiter));

    mgr.wakeup(waiter, Some(1)).unwrap();
    mgr.wakeup(target, Some(1)).unwrap();
    mgr.sleep(boot()).unwrap();
    assert_eq!(mgr.current_task(), waiter);

    let blocked = mgr.wait_finish(waiter, target).unwrap();
    assert_eq!(
        blocked,
        WaitFinish::Blocked(Some(Switch {
            next: target,
            current: waiter
        }))
    );
    assert!(!mgr.task(waiter).unwrap().is_running());

    assert_eq!(mgr.finish(42), waiter);
    assert!(mgr.task(target).is_none());
    assert!(mgr.task(waiter).unwrap().is_running());
    assert_consistent(&mgr);

    assert_eq!(mgr.wait_finish(waiter, target), Ok(WaitFinish::Exited(42)));
    assert_eq!(mgr.wait_finish(waiter, target), Err(TaskError::NoSuchTask));
}

#[test]
fn all_waiters_wake_but_one_gets_the_code() {
    let mut mgr = TaskManager::new(Config::default());
    let target = mgr.new_task();
    let first = mgr.new_task();
    let second = mgr.new_task();
    for id in [first, second, target] {
        mgr.wakeup(id, Some(2)).unwrap();
    }
    mgr.sleep(boot()).unwrap();

    assert!(matches!(mgr.wait_finish(first, target), Ok(WaitFinish::Blocked(Some(_)))));
    assert!(matches!(mgr.wait_finish(second, target), Ok(WaitFinish::Blocked(Some(_)))));
    assert_eq!(mgr.current_task(), target);

    mgr.finish(-1);
    assert!(mgr.task(first).unwrap().is_running());
    assert!(mgr.task(second).unwrap().is_running());
    assert_consistent(&mgr);

    assert_eq!(mgr.wait_finish(first, target), Ok(WaitFinish::Exited(-1)));
    assert_eq!(mgr.wait_finish(second, target), Err(TaskError::NoSuchTask));
}

#[test]
fn finished_task_is_reaped_by_next_task_operation() {
    let (mut mgr, ids) = with_tasks(&[1, 1]);
    let next = mgr.finish(0);
    assert_eq!(next, ids[1]);
    assert_eq!(mgr.zombie_count(), 1);
    assert!(mgr.context_ptr(ids[0]).is_some());

    mgr.new_task();
    assert_eq!(mgr.zombie_count(), 0);
    assert!(mgr.context_ptr(ids[0]).is_none());
}

#[test]
fn ids_are_never_reused() {
    let (mut mgr, ids) = with_tasks(&[1, 0]);
    assert_eq!(mgr.finish(0), ids[1]);
    let fresh = mgr.new_task();
    assert!(fresh > ids[0]);
}

#[test]
fn late_waiter_still_gets_exit_code() {
    let (mut mgr, ids) = with_tasks(&[2, 0]);
    assert_eq!(mgr.finish(9), ids[1]);
    assert_eq!(mgr.wait_finish(ids[1], ids[0]), Ok(WaitFinish::Exited(9)));
    assert_eq!(mgr.wait_finish(ids[1], ids[0]), Err(TaskError::NoSuchTask));
}
