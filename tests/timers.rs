use taskcore::config::Config;
use taskcore::message::{Label, Message, MessageKind};
use taskcore::task::manager::TaskManager;
use taskcore::timer::TimerManager;
use taskcore::TaskId;

fn setup(period: u64) -> (TimerManager, TaskManager) {
    let config = Config {
        scheduler_period: period,
        ..Config::default()
    };
    (TimerManager::new(&config), TaskManager::new(config))
}

fn drain(tasks: &mut TaskManager, id: TaskId) -> Vec<Message> {
    core::iter::from_fn(|| tasks.receive_message(id).unwrap()).collect()
}

fn timeout_values(msgs: &[Message]) -> Vec<i32> {
    msgs.iter()
        .map(|m| match m.kind {
            MessageKind::TimerTimeout { value, .. } => value,
            other => panic!("unexpected {:?}", other),
        })
        .collect()
}

#[test]
fn timer_fires_exactly_once_at_expiry() {
    let (mut timers, mut tasks) = setup(2);
    let target = tasks.new_task();
    timers.add_timer(5, 77, target, "blink");

    for _ in 1..5 {
        assert!(!timers.tick(&mut tasks));
        assert_eq!(tasks.task(target).unwrap().pending_messages(), 0);
    }
    timers.tick(&mut tasks);
    assert_eq!(timers.current_tick(), 5);
    assert_eq!(timers.pending(), 0);

    let msgs = drain(&mut tasks, target);
    assert_eq!(
        msgs,
        [Message::new(MessageKind::TimerTimeout {
            timeout: 5,
            value: 77,
            description: Label::new("blink"),
        })]
    );
    assert!(tasks.task(target).unwrap().is_running());

    timers.tick(&mut tasks);
    assert!(drain(&mut tasks, target).is_empty());
}

#[test]
fn late_timer_fires_on_next_tick() {
    let (mut timers, mut tasks) = setup(2);
    let target = tasks.new_task();
    for _ in 0..3 {
        timers.tick(&mut tasks);
    }
    timers.add_timer(1, 9, target, "late");
    timers.tick(&mut tasks);
    assert_eq!(timeout_values(&drain(&mut tasks, target)), [9]);
}

#[test]
fn max_value_is_an_ordinary_user_value() {
    let (mut timers, mut tasks) = setup(100);
    let target = tasks.new_task();
    timers.add_timer(1, i32::MAX, target, "max");

    assert!(!timers.tick(&mut tasks));
    assert_eq!(timeout_values(&drain(&mut tasks, target)), [i32::MAX]);
}

#[test]
fn scheduler_tick_and_user_timer_share_a_tick() {
    let (mut timers, mut tasks) = setup(3);
    let target = tasks.new_task();
    timers.start_scheduler_timer();
    timers.add_timer(3, 1, target, "same");

    assert!(!timers.tick(&mut tasks));
    assert!(!timers.tick(&mut tasks));
    assert!(timers.tick(&mut tasks));
    assert_eq!(timeout_values(&drain(&mut tasks, target)), [1]);
    assert_eq!(timers.pending(), 1);
}

#[test]
fn equal_expiry_fires_in_insertion_order() {
    let (mut timers, mut tasks) = setup(100);
    let target = tasks.new_task();
    for value in [3, 1, 2] {
        timers.add_timer(2, value, target, "tie");
    }
    timers.add_timer(1, 0, target, "first");

    timers.tick(&mut tasks);
    timers.tick(&mut tasks);
    assert_eq!(timeout_values(&drain(&mut tasks, target)), [0, 3, 1, 2]);
}

#[test]
fn relative_timer_counts_from_current_tick() {
    let (mut timers, mut tasks) = setup(100);
    let target = tasks.new_task();
    for _ in 0..10 {
        timers.tick(&mut tasks);
    }
    timers.add_timer_after(3, 5, target, "after");

    for _ in 0..2 {
        timers.tick(&mut tasks);
    }
    assert_eq!(tasks.task(target).unwrap().pending_messages(), 0);
    timers.tick(&mut tasks);

    let msgs = drain(&mut tasks, target);
    assert!(matches!(
        msgs[..],
        [Message {
            kind: MessageKind::TimerTimeout { timeout: 13, value: 5, .. },
            ..
        }]
    ));
}

#[test]
fn long_description_is_truncated() {
    let (mut timers, mut tasks) = setup(100);
    let target = tasks.new_task();
    timers.add_timer(1, 0, target, "a-very-long-description");
    timers.tick(&mut tasks);

    match drain(&mut tasks, target)[..] {
        [Message {
            kind: MessageKind::TimerTimeout { description, .. },
            ..
        }] => assert_eq!(description.as_str(), "a-very-lo"),
        ref other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn timer_for_finished_task_is_dropped() {
    let (mut timers, mut tasks) = setup(100);
    let idle = tasks.new_task();
    tasks.wakeup(idle, Some(0)).unwrap();
    let target = tasks.new_task();
    tasks.wakeup(target, Some(taskcore::config::MAX_LEVEL)).unwrap();
    timers.add_timer(1, 0, target, "orphan");

    // boot task is ahead of `target` at the top level
    tasks.sleep(TaskId::from(1)).unwrap();
    assert_eq!(tasks.finish(0), idle);

    timers.tick(&mut tasks);
    assert_eq!(timers.pending(), 0);
    assert!(tasks.task(target).is_none());
}
