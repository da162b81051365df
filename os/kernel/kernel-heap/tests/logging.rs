use kernel_heap::{Arena, Handle, LockedArena};
use log::{LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;

static HEAP: LockedArena<'static> = LockedArena::new();

/// Records every message together with the heap's lock state at log time.
struct LockStateLogger {
    lines: Mutex<Vec<(String, bool)>>,
}

impl Log for LockStateLogger {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let line = record.args().to_string();
        self.lines.lock().unwrap().push((line, HEAP.is_locked()));
    }

    fn flush(&self) {}
}

static LOGGER: LockStateLogger = LockStateLogger {
    lines: Mutex::new(Vec::new()),
};

#[repr(align(16))]
struct Mem([u8; 1024]);

fn lock_state_of(needle: &str) -> Option<bool> {
    LOGGER
        .lines
        .lock()
        .unwrap()
        .iter()
        .find(|(line, _)| line.contains(needle))
        .map(|&(_, locked)| locked)
}

// One test per binary: the logger is process-global.
#[test]
fn lock_state_while_logging() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let first = Box::leak(Box::new(Mem([0; 1024])));
    let second = Box::leak(Box::new(Mem([0; 1024])));
    assert!(HEAP.attach(Arena::new(&mut first.0)));

    // Rejected attaches are reported after the lock is released, so a
    // logger may inspect the heap.
    assert!(!HEAP.attach(Arena::new(&mut second.0)));
    assert_eq!(lock_state_of("already attached"), Some(false));

    // Arena diagnostics are emitted from inside the critical section.
    HEAP.with_arena(|arena| arena.deallocate(Handle::from_addr(1)));
    assert_eq!(lock_state_of("ignoring deallocation"), Some(true));
    assert!(!HEAP.is_locked());
}
