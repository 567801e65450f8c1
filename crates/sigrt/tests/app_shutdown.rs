//! Application startup/idle-shutdown pattern built from one-shot sources.
//!
//! An application object declares `active` and `quit`. At startup two
//! sources are installed next to the window pumps:
//! - the first emits `active` on its first dispatch and finishes;
//! - the second only passes its check once it is the last source attached,
//!   then emits `quit` and finishes, which lets `loop_run` return.

mod common;

use common::{CallLog, Counter, new_object, register_app_class, register_window_class};
use sigrt::{MainLoop, Object, Runtime, Source, SourceFuncs};

/// Check passes only when this is the loop's last attached source.
struct LastOneStanding;

impl SourceFuncs for LastOneStanding {
    fn check(&self, rt: &Runtime, source: Source) -> bool {
        rt.source_loop(source)
            .is_some_and(|main_loop| rt.loop_source_count(main_loop) == 1)
    }
}

fn install_app_sources(rt: &Runtime, app: Object, main_loop: MainLoop) {
    let active = rt.source_new();
    rt.source_set_callback(active, move |rt, _| {
        if let Ok(signal) = rt.object_find_signal(app, "active") {
            rt.signal_emit(signal);
        }
        false
    });

    let quit = rt.source_new_with_funcs(LastOneStanding);
    rt.source_set_callback(quit, move |rt, _| {
        if let Ok(signal) = rt.object_find_signal(app, "quit") {
            rt.signal_emit(signal);
        }
        false
    });

    rt.source_attach(active, main_loop).unwrap();
    rt.source_attach(quit, main_loop).unwrap();
}

/// Window pump that reports a resize on every dispatch and closes after
/// `frames` dispatches.
fn install_window_pump(rt: &Runtime, window: Object, frames: usize, main_loop: MainLoop) {
    let pump = rt.source_new();
    let dispatched = Counter::new();
    rt.source_set_callback(pump, move |rt, _| {
        let frame = dispatched.bump();
        if let Ok(resize) = rt.object_find_signal(window, "resize") {
            rt.signal_emit_with_param(resize, &(frame as u32 * 10, frame as u32 * 5));
        }
        if frame < frames {
            return true;
        }
        if let Ok(close) = rt.object_find_signal(window, "close") {
            rt.signal_emit(close);
        }
        false
    });
    rt.source_attach(pump, main_loop).unwrap();
}

#[test]
fn test_active_then_quit_after_windows_close() {
    let rt = Runtime::new();
    let app_class = register_app_class(&rt);
    let window_class = register_window_class(&rt);
    let log = CallLog::new();

    let app = new_object(&rt, app_class);
    for event in ["active", "quit"] {
        let entry = log.clone();
        rt.signal_connect(app, event, move |_, _| entry.push(event)).unwrap();
    }

    let window = new_object(&rt, window_class);
    let entry = log.clone();
    rt.signal_connect_with_param(window, "resize", move |_, _, size| {
        if let Some((w, h)) = size.downcast_ref::<(u32, u32)>() {
            entry.push(format!("resize:{w}x{h}"));
        }
    })
    .unwrap();
    let entry = log.clone();
    rt.signal_connect(window, "close", move |_, _| entry.push("close")).unwrap();

    let main_loop = rt.loop_new();
    install_window_pump(&rt, window, 3, main_loop);
    install_app_sources(&rt, app, main_loop);

    rt.loop_run(main_loop);

    assert_eq!(
        log.entries(),
        [
            "active",
            "resize:10x5",
            "resize:20x10",
            "resize:30x15",
            "close",
            "quit",
        ]
    );
    assert_eq!(rt.loop_source_count(main_loop), 0);
    assert!(!rt.loop_is_running(main_loop));
}

#[test]
fn test_quit_listener_can_stop_the_loop_early() {
    let rt = Runtime::new();
    let app_class = register_app_class(&rt);
    let app = new_object(&rt, app_class);
    let main_loop = rt.loop_new();

    // A pump that never finishes on its own.
    let pump = rt.source_new();
    let frames = Counter::new();
    let counted = frames.clone();
    rt.source_set_callback(pump, move |_, _| {
        counted.bump();
        true
    });
    rt.source_attach(pump, main_loop).unwrap();

    rt.signal_connect(app, "active", move |rt, _| rt.loop_quit(main_loop))
        .unwrap();
    install_app_sources(&rt, app, main_loop);

    rt.loop_run(main_loop);

    // `active` fires in the first dispatch; the cycle still completes.
    assert_eq!(frames.get(), 1);
    assert_eq!(rt.loop_sources(main_loop).len(), 2);
}

#[test]
fn test_no_windows_quits_on_second_cycle() {
    let rt = Runtime::new();
    let app_class = register_app_class(&rt);
    let app = new_object(&rt, app_class);
    let quits = Counter::new();
    let hook = quits.clone();
    rt.signal_connect(app, "quit", move |_, _| {
        hook.bump();
    })
    .unwrap();

    let main_loop = rt.loop_new();
    install_app_sources(&rt, app, main_loop);

    let mut cycles = 0;
    while rt.loop_source_count(main_loop) > 0 {
        for _ in 0..4 {
            rt.loop_tick(main_loop);
        }
        cycles += 1;
    }

    assert_eq!(cycles, 2);
    assert_eq!(quits.get(), 1);
}
