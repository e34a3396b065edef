use std::fs;
use std::path::PathBuf;
use std::thread;

use param_store::SharedParams;

fn scratch(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("param-stress-{}-{}", std::process::id(), name));
    fs::remove_file(&path).ok();
    path
}

// Eight writers hammer one slot without locks. Increments race and some get
// lost, but the buffer must end up strictly positive and never overcount.
#[test]
fn racing_increments_lose_updates_but_never_invent_them() {
    let path = scratch("one-slot");
    let owner = SharedParams::share(&path, &[0.0; 4]).unwrap();

    let writers: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let handle = SharedParams::attach(&path, 4).unwrap();
                for _ in 0..1000 {
                    handle.update(|params| params[0] += 1.0);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let total = owner.with(|params| params[0]);
    assert!(total > 0.0, "every increment was lost: {total}");
    assert!(total <= 8000.0, "increments were invented: {total}");
    assert_eq!(total.fract(), 0.0);
    owner.remove().unwrap();
}

// Writers that touch disjoint slots never disturb each other, which is what
// makes the unsynchronized scheme workable for training.
#[test]
fn disjoint_slots_survive_concurrent_writers_intact() {
    let path = scratch("disjoint");
    let owner = SharedParams::share(&path, &[0.0; 8]).unwrap();

    let writers: Vec<_> = (0..8usize)
        .map(|slot| {
            let path = path.clone();
            thread::spawn(move || {
                let handle = SharedParams::attach(&path, 8).unwrap();
                for step in 1..=500 {
                    handle.update(|params| params[slot] = (slot * 1000 + step) as f32);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let finals = owner.snapshot();
    for (slot, value) in finals.iter().enumerate() {
        assert_eq!(*value, (slot * 1000 + 500) as f32);
    }
    owner.remove().unwrap();
}
