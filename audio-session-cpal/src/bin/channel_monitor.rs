//! Print the channel count of the default input as it changes.
//!
//! ```text
//! channel-monitor [config.json]
//! ```
//!
//! Plugging or unplugging a USB audio interface swaps the input live.
//! `RUST_LOG=debug` shows the session internals.

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_session_core::{
    CallbackContext, CaptureSessionManager, RouteChangeReactor, RunLoop, SessionConfiguration, SetupResult,
};
use audio_session_cpal::{CpalCaptureEngine, HostPermissionGateway, RouteMonitor, DEFAULT_POLL_INTERVAL};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let configuration = match std::env::args().nth(1) {
        Some(path) => match SessionConfiguration::from_json_file(Path::new(&path)) {
            Ok(configuration) => configuration,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => SessionConfiguration::default(),
    };

    let run_loop = RunLoop::new();
    let context: Arc<dyn CallbackContext> = Arc::new(run_loop.handle());
    let gateway = Arc::new(HostPermissionGateway::new(Arc::clone(&context)));

    let manager = match CaptureSessionManager::new(
        CpalCaptureEngine::default(),
        gateway,
        Arc::clone(&context),
        configuration,
    ) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Failed to create capture session: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let last_count = Arc::new(AtomicU32::new(0));
    manager.set_channel_count_observer(Arc::new(move |count: u32| {
        if last_count.swap(count, Ordering::SeqCst) != count {
            println!("Input channels: {}", count);
        }
    }));

    let running = Arc::new(AtomicBool::new(true));
    let failed = Arc::new(AtomicBool::new(false));
    let r = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping capture...");
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    let setup_manager = manager.clone();
    let (r, f) = (Arc::clone(&running), Arc::clone(&failed));
    manager.request_access_and_setup(move |result| {
        if result != SetupResult::Success {
            eprintln!("Setup failed: {}", result);
            f.store(true, Ordering::SeqCst);
            r.store(false, Ordering::SeqCst);
            return;
        }
        let (r, f) = (Arc::clone(&r), Arc::clone(&f));
        setup_manager.start_running(move |started| {
            if let Err(e) = started {
                eprintln!("{}", e);
                f.store(true, Ordering::SeqCst);
                r.store(false, Ordering::SeqCst);
            } else {
                println!("Capturing. Press Ctrl+C to stop");
            }
        });
    });

    // Route changes are handled on the run loop like every other callback.
    let reactor = Arc::new(RouteChangeReactor::new(Arc::new(manager.clone())));
    let route_context = Arc::clone(&context);
    let mut monitor = match RouteMonitor::start(DEFAULT_POLL_INTERVAL, move |change| {
        let reactor = Arc::clone(&reactor);
        route_context.dispatch(Box::new(move || {
            reactor.handle_route_change(&change);
        }));
    }) {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            log::warn!("Route monitoring unavailable: {}", e);
            None
        }
    };

    while running.load(Ordering::SeqCst) {
        run_loop.run_once(Duration::from_millis(100));
    }

    if let Some(monitor) = monitor.as_mut() {
        monitor.stop();
    }

    let stopped = Arc::new(AtomicBool::new(false));
    let s = Arc::clone(&stopped);
    manager.stop_running(move |result| {
        if let Err(e) = result {
            log::warn!("{}", e);
        }
        s.store(true, Ordering::SeqCst);
    });
    let deadline = Instant::now() + Duration::from_secs(2);
    while !stopped.load(Ordering::SeqCst) && Instant::now() < deadline {
        run_loop.run_once(Duration::from_millis(50));
    }

    log::info!("Diagnostics: {:?}", manager.diagnostics());

    if failed.load(Ordering::SeqCst) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
