// Детерминированная платформа: виртуальные часы, ручные таймеры и
// однопоточный executor. Используется в тестах и на не-WASM платформах.

use super::{Platform, TimerId};
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;

struct PendingTimer {
    due: i64,
    callback: Box<dyn FnOnce()>,
}

pub struct ManualPlatform {
    now: Cell<i64>,
    timers: RefCell<BTreeMap<TimerId, PendingTimer>>,
    next_timer: Cell<u64>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl ManualPlatform {
    /// Создать платформу с часами, выставленными на `now_ms`
    pub fn new(now_ms: i64) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            now: Cell::new(now_ms),
            timers: RefCell::new(BTreeMap::new()),
            next_timer: Cell::new(1),
            pool: RefCell::new(pool),
            spawner,
        }
    }

    /// Выполнить все готовые задачи
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Сдвинуть часы на `delta_ms`, по пути срабатывают наступившие таймеры
    pub fn advance(&self, delta_ms: i64) {
        let target = self.now.get() + delta_ms;
        self.run_until_stalled();

        while let Some(timer) = self.take_due_timer(target) {
            if timer.due > self.now.get() {
                self.now.set(timer.due);
            }
            (timer.callback)();
            self.run_until_stalled();
        }

        self.now.set(target);
        self.run_until_stalled();
    }

    /// Выставить часы без запуска таймеров
    pub fn set_now(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    /// Количество взведённых таймеров
    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Задержка до ближайшего таймера
    pub fn next_timer_delay(&self) -> Option<i64> {
        let now = self.now.get();
        self.timers
            .borrow()
            .values()
            .map(|t| t.due - now)
            .min()
    }

    fn take_due_timer(&self, target: i64) -> Option<PendingTimer> {
        let mut timers = self.timers.borrow_mut();
        let id = timers
            .iter()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(id, t)| (t.due, **id))
            .map(|(id, _)| *id)?;
        timers.remove(&id)
    }
}

impl Platform for ManualPlatform {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.spawner.spawn_local(task) {
            tracing::warn!("failed to spawn local task: {}", e);
        }
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = TimerId(self.next_timer.get());
        self.next_timer.set(id.0 + 1);
        let due = self.now.get() + i64::from(delay_ms);
        self.timers
            .borrow_mut()
            .insert(id, PendingTimer { due, callback });
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.timers.borrow_mut().remove(&id);
    }
}

impl fmt::Debug for ManualPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualPlatform")
            .field("now", &self.now.get())
            .field("timers", &self.timers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_timers_fire_in_order() {
        let platform = ManualPlatform::new(1_000);
        let fired = Rc::new(RefCell::new(Vec::new()));

        let log = fired.clone();
        platform.set_timeout(200, Box::new(move || log.borrow_mut().push("late")));
        let log = fired.clone();
        platform.set_timeout(100, Box::new(move || log.borrow_mut().push("early")));

        platform.advance(150);
        assert_eq!(*fired.borrow(), vec!["early"]);
        assert_eq!(platform.active_timers(), 1);

        platform.advance(100);
        assert_eq!(*fired.borrow(), vec!["early", "late"]);
        assert_eq!(platform.now_ms(), 1_250);
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let platform = ManualPlatform::new(0);
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let id = platform.set_timeout(10, Box::new(move || flag.set(true)));
        platform.clear_timeout(id);
        platform.advance(100);
        assert!(!fired.get());
    }

    #[test]
    fn test_spawned_tasks_run() {
        let platform = ManualPlatform::new(0);
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        platform.spawn_local(Box::pin(async move { flag.set(true) }));
        platform.run_until_stalled();
        assert!(done.get());
    }
}
