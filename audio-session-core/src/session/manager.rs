use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::bridge::output::AudioDataOutput;
use crate::bridge::sample_delivery::SampleDeliveryBridge;
use crate::executor::dispatch_queue::DispatchQueue;
use crate::executor::serial_executor::SerialExecutor;
use crate::models::audio_models::SessionDiagnostics;
use crate::models::config::SessionConfiguration;
use crate::models::error::SessionError;
use crate::models::state::{AuthorizationStatus, SetupResult};
use crate::session::graph::SessionGraph;
use crate::traits::callback_context::CallbackContext;
use crate::traits::capture_engine::CaptureEngine;
use crate::traits::capture_session::{CaptureSession, Completion};
use crate::traits::channel_observer::{ChannelCountObserver, SampleBufferConsumer};
use crate::traits::permission_gateway::PermissionGateway;

enum SetupPhase {
    Idle,
    /// First setup is running; later callers wait for its result.
    InFlight(Vec<Completion<SetupResult>>),
    Done(SetupResult),
}

struct ManagerShared<E: CaptureEngine> {
    session_id: Uuid,
    graph: Mutex<SessionGraph<E>>,
    setup: Mutex<SetupPhase>,
    running: AtomicBool,
    executor: SerialExecutor,
    delivery: Arc<DispatchQueue>,
    gateway: Arc<dyn PermissionGateway>,
    bridge: Arc<SampleDeliveryBridge>,
    diagnostics: Arc<Mutex<SessionDiagnostics>>,
}

impl<E: CaptureEngine> ManagerShared<E> {
    fn setup_result(&self) -> SetupResult {
        match *self.setup.lock() {
            SetupPhase::Done(result) => result,
            _ => SetupResult::None,
        }
    }

    /// Record the terminal setup result and release every waiting caller.
    fn finish_setup(&self, result: SetupResult) {
        let waiters = {
            let mut phase = self.setup.lock();
            match std::mem::replace(&mut *phase, SetupPhase::Done(result)) {
                SetupPhase::InFlight(waiters) => waiters,
                previous => {
                    log::error!("Session {} finished setup outside a setup sequence", self.session_id);
                    *phase = previous;
                    return;
                }
            }
        };

        log::info!("Session {} setup finished: {}", self.session_id, result);
        for completion in waiters {
            self.executor.deliver(result, completion);
        }
    }

    /// Call into the engine, turning a panic inside it into `on_panic`.
    fn guarded<T>(
        &self,
        name: &str,
        on_panic: T,
        op: impl FnOnce(&mut SessionGraph<E>) -> T,
    ) -> T {
        panic::catch_unwind(AssertUnwindSafe(|| op(&mut *self.graph.lock()))).unwrap_or_else(|_| {
            log::error!("Session {} engine panicked during {}", self.session_id, name);
            on_panic
        })
    }

    fn configure(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        self.executor.execute(move || {
            let output = AudioDataOutput::new();
            let configured = shared.guarded(
                "configuration",
                Err(SessionError::UnableToAddCaptureDeviceInput),
                |graph| graph.configure(&output),
            );

            let result = match configured {
                Ok(()) => {
                    let consumer: Arc<dyn SampleBufferConsumer> = shared.bridge.clone();
                    let queue: Arc<dyn CallbackContext> = shared.delivery.clone();
                    output.set_sample_buffer_consumer(consumer, queue);
                    SetupResult::Success
                }
                Err(e) => {
                    log::warn!("Session {} configuration failed: {}", shared.session_id, e);
                    SetupResult::Failed
                }
            };
            shared.finish_setup(result);
        });
    }

    /// Run a running-state or input operation on the executor once setup has
    /// succeeded; otherwise fail without touching the engine. An engine panic
    /// completes with `on_panic`.
    fn run_configured<Op, Done>(
        self: &Arc<Self>,
        name: &'static str,
        on_panic: SessionError,
        op: Op,
        completion: Done,
    ) where
        Op: FnOnce(&mut SessionGraph<E>) -> Result<(), SessionError> + Send + 'static,
        Done: FnOnce(Result<(), SessionError>) + Send + 'static,
    {
        if !self.setup_result().is_success() {
            log::warn!("Session {} cannot {}: not set up", self.session_id, name);
            self.executor
                .deliver(Err(SessionError::CaptureSessionIsNotSetup), completion);
            return;
        }

        let shared = Arc::clone(self);
        self.executor.submit(
            move || {
                let result = shared.guarded(name, Err(on_panic), op);
                let running = shared.guarded("is_running", false, |graph| graph.is_running());
                shared.running.store(running, Ordering::SeqCst);
                match &result {
                    Ok(()) => log::info!("Session {} {} ok", shared.session_id, name),
                    Err(e) => log::warn!("Session {} {} failed: {}", shared.session_id, name, e),
                }
                result
            },
            completion,
        );
    }
}

/// Permission-gated capture session state machine.
///
/// Owns the capture engine for its whole lifetime and funnels every engine
/// mutation through one serial executor. All operations return immediately;
/// completions and channel counts arrive on the caller-facing context.
///
/// ```text
/// caller ─ request_access_and_setup ─→ PermissionGateway
///        ─ start/stop/refresh ───────→ SerialExecutor ─→ CaptureEngine
///                                                           │ buffers
/// caller ←─ observer ←─ SampleDeliveryBridge ←─ delivery queue
/// ```
///
/// Clones are handles to the same session.
pub struct CaptureSessionManager<E: CaptureEngine> {
    shared: Arc<ManagerShared<E>>,
}

impl<E: CaptureEngine> Clone for CaptureSessionManager<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: CaptureEngine> CaptureSessionManager<E> {
    pub fn new(
        engine: E,
        gateway: Arc<dyn PermissionGateway>,
        callback_context: Arc<dyn CallbackContext>,
        configuration: SessionConfiguration,
    ) -> Result<Self, SessionError> {
        configuration.validate()?;

        let session_id = Uuid::new_v4();
        let diagnostics = Arc::new(Mutex::new(SessionDiagnostics::default()));
        let executor = SerialExecutor::new(
            configuration.executor_label.clone(),
            Arc::clone(&callback_context),
        )?;
        let delivery = Arc::new(DispatchQueue::new(configuration.delivery_label.clone())?);
        let bridge = Arc::new(SampleDeliveryBridge::new(
            callback_context,
            configuration.delivery_policy,
            Arc::clone(&diagnostics),
        ));

        log::info!(
            "Session {} created (executor: {}, delivery: {}, policy: {:?})",
            session_id,
            configuration.executor_label,
            configuration.delivery_label,
            configuration.delivery_policy
        );

        Ok(Self {
            shared: Arc::new(ManagerShared {
                session_id,
                graph: Mutex::new(SessionGraph::new(engine, Arc::clone(&diagnostics))),
                setup: Mutex::new(SetupPhase::Idle),
                running: AtomicBool::new(false),
                executor,
                delivery,
                gateway,
                bridge,
                diagnostics,
            }),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    pub fn setup_result(&self) -> SetupResult {
        self.shared.setup_result()
    }

    /// Running state as of the last completed start/stop/refresh.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.shared.diagnostics.lock().clone()
    }

    pub fn set_channel_count_observer(&self, observer: Arc<dyn ChannelCountObserver>) {
        self.shared.bridge.set_observer(observer);
    }

    pub fn clear_channel_count_observer(&self) {
        self.shared.bridge.clear_observer();
    }

    /// Ask for microphone access and configure the session, once.
    ///
    /// Later calls do not run setup again: they receive the recorded result,
    /// or, while the first setup is still running, wait for it.
    pub fn request_access_and_setup(&self, completion: impl FnOnce(SetupResult) + Send + 'static) {
        let completion: Completion<SetupResult> = Box::new(completion);
        {
            let mut phase = self.shared.setup.lock();
            if let SetupPhase::Done(result) = *phase {
                log::debug!(
                    "Session {} already set up ({}); repeated setup is not supported",
                    self.shared.session_id,
                    result
                );
                self.shared.executor.deliver(result, completion);
                return;
            }
            if let SetupPhase::InFlight(waiters) = &mut *phase {
                waiters.push(completion);
                return;
            }
            *phase = SetupPhase::InFlight(vec![completion]);
        }

        match self.shared.gateway.current_authorization() {
            AuthorizationStatus::Authorized => self.shared.configure(),
            AuthorizationStatus::NotDetermined => {
                log::info!("Session {} requesting microphone access", self.shared.session_id);
                let shared = Arc::clone(&self.shared);
                self.shared
                    .gateway
                    .request_authorization(Box::new(move |granted| {
                        if granted {
                            shared.configure();
                        } else {
                            shared.finish_setup(SetupResult::NoAccessToMic);
                        }
                    }));
            }
            status @ (AuthorizationStatus::Denied | AuthorizationStatus::Restricted) => {
                log::warn!("Session {} microphone access {:?}", self.shared.session_id, status);
                self.shared.finish_setup(SetupResult::NoAccessToMic);
            }
        }
    }

    pub fn start_running(&self, completion: impl FnOnce(Result<(), SessionError>) + Send + 'static) {
        self.shared.run_configured(
            "start",
            SessionError::UnableToStartSession,
            |graph| graph.start(),
            completion,
        );
    }

    pub fn stop_running(&self, completion: impl FnOnce(Result<(), SessionError>) + Send + 'static) {
        self.shared.run_configured(
            "stop",
            SessionError::UnableToStopSession,
            |graph| graph.stop(),
            completion,
        );
    }

    /// Replace the active input with a fresh default-device input without
    /// stopping capture.
    pub fn refresh_audio(&self, completion: impl FnOnce(Result<(), SessionError>) + Send + 'static) {
        self.shared.run_configured(
            "refresh audio",
            SessionError::UnableToAddCaptureDeviceInput,
            |graph| graph.refresh_input(),
            completion,
        );
    }
}

impl<E: CaptureEngine> CaptureSession for CaptureSessionManager<E> {
    fn setup_result(&self) -> SetupResult {
        CaptureSessionManager::setup_result(self)
    }

    fn request_access_and_setup(&self, completion: Completion<SetupResult>) {
        CaptureSessionManager::request_access_and_setup(self, completion)
    }

    fn start_running(&self, completion: Completion<Result<(), SessionError>>) {
        CaptureSessionManager::start_running(self, completion)
    }

    fn stop_running(&self, completion: Completion<Result<(), SessionError>>) {
        CaptureSessionManager::stop_running(self, completion)
    }

    fn refresh_audio(&self, completion: Completion<Result<(), SessionError>>) {
        CaptureSessionManager::refresh_audio(self, completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::run_loop::RunLoop;
    use crate::models::config::DeliveryPolicy;
    use crate::simulated::{
        EngineCall, SimulatedCaptureEngine, SimulatedDevice, SimulatedEngineHandle,
        SimulatedPermissionGateway,
    };
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        run_loop: RunLoop,
        manager: CaptureSessionManager<SimulatedCaptureEngine>,
        engine: SimulatedEngineHandle,
        gateway: Arc<SimulatedPermissionGateway>,
    }

    fn harness(status: AuthorizationStatus, grant: bool, device: Option<SimulatedDevice>) -> Harness {
        harness_with(status, grant, device, SessionConfiguration::default())
    }

    fn harness_with(
        status: AuthorizationStatus,
        grant: bool,
        device: Option<SimulatedDevice>,
        configuration: SessionConfiguration,
    ) -> Harness {
        let run_loop = RunLoop::new();
        let context: Arc<dyn CallbackContext> = Arc::new(run_loop.handle());
        let gateway = Arc::new(SimulatedPermissionGateway::new(status, grant, Arc::clone(&context)));
        let (engine, handle) = SimulatedCaptureEngine::new(device);
        let manager = CaptureSessionManager::new(engine, gateway.clone(), context, configuration).unwrap();
        Harness {
            run_loop,
            manager,
            engine: handle,
            gateway,
        }
    }

    /// Register a completion via `start` and pump the run loop until it fires.
    fn wait_for<T: Send + 'static>(
        run_loop: &RunLoop,
        start: impl FnOnce(Box<dyn FnOnce(T) + Send>),
    ) -> (T, ThreadId) {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        start(Box::new(move |value| {
            *sink.lock() = Some((value, thread::current().id()));
        }));
        assert!(run_loop.run_until(WAIT, || slot.lock().is_some()), "completion never arrived");
        let taken = slot.lock().take();
        taken.unwrap()
    }

    fn setup(h: &Harness) -> SetupResult {
        wait_for(&h.run_loop, |done| h.manager.request_access_and_setup(done)).0
    }

    fn start(h: &Harness) -> Result<(), SessionError> {
        wait_for(&h.run_loop, |done| h.manager.start_running(done)).0
    }

    fn stop(h: &Harness) -> Result<(), SessionError> {
        wait_for(&h.run_loop, |done| h.manager.stop_running(done)).0
    }

    fn refresh(h: &Harness) -> Result<(), SessionError> {
        wait_for(&h.run_loop, |done| h.manager.refresh_audio(done)).0
    }

    #[test]
    fn permission_denied_blocks_setup_and_start() {
        let h = harness(AuthorizationStatus::Denied, false, Some(SimulatedDevice::built_in_mic()));

        assert_eq!(setup(&h), SetupResult::NoAccessToMic);
        assert_eq!(h.manager.setup_result(), SetupResult::NoAccessToMic);
        assert_eq!(start(&h), Err(SessionError::CaptureSessionIsNotSetup));
        assert!(h.engine.journal().is_empty(), "engine must not be touched");
    }

    #[test]
    fn restricted_is_treated_like_denied() {
        let h = harness(AuthorizationStatus::Restricted, true, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::NoAccessToMic);
        assert_eq!(h.gateway.request_count(), 0);
    }

    #[test]
    fn authorized_setup_then_start_runs() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));

        assert_eq!(setup(&h), SetupResult::Success);
        assert!(h.engine.has_output());
        assert_eq!(h.engine.attached_inputs().len(), 1);
        assert_eq!(h.gateway.request_count(), 0);

        assert_eq!(start(&h), Ok(()));
        assert!(h.manager.is_running());
        assert!(h.engine.is_running());
    }

    #[test]
    fn undetermined_permission_prompts_user() {
        let granted = harness(AuthorizationStatus::NotDetermined, true, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&granted), SetupResult::Success);
        assert_eq!(granted.gateway.request_count(), 1);

        let refused = harness(AuthorizationStatus::NotDetermined, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&refused), SetupResult::NoAccessToMic);
        assert!(refused.engine.journal().is_empty());
    }

    #[test]
    fn missing_device_fails_permanently() {
        let h = harness(AuthorizationStatus::Authorized, false, None);

        assert_eq!(setup(&h), SetupResult::Failed);
        assert_eq!(h.manager.setup_result(), SetupResult::Failed);
        assert_eq!(h.engine.transaction_depth(), 0);

        // A device showing up later does not make setup run again.
        h.engine.set_default_device(Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Failed);
        assert_eq!(h.gateway.query_count(), 1);
        assert_eq!(h.engine.count_calls(&EngineCall::BeginConfiguration), 1);
    }

    #[test]
    fn rejected_output_or_input_fails_setup() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        h.engine.set_reject_output(true);
        assert_eq!(setup(&h), SetupResult::Failed);

        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        h.engine.set_reject_input(true);
        assert_eq!(setup(&h), SetupResult::Failed);
        assert_eq!(h.engine.transaction_depth(), 0);
    }

    #[test]
    fn overlapping_setup_configures_once() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        let results = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let sink = Arc::clone(&results);
            h.manager
                .request_access_and_setup(move |result| sink.lock().push(result));
        }

        assert!(h.run_loop.run_until(WAIT, || results.lock().len() == 2));
        assert_eq!(*results.lock(), vec![SetupResult::Success, SetupResult::Success]);
        assert_eq!(h.engine.count_calls(&EngineCall::BeginConfiguration), 1);
        assert_eq!(h.gateway.query_count(), 1);

        assert_eq!(setup(&h), SetupResult::Success);
        assert_eq!(h.engine.count_calls(&EngineCall::BeginConfiguration), 1);
    }

    #[test]
    fn operations_before_setup_never_touch_engine() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));

        assert_eq!(start(&h), Err(SessionError::CaptureSessionIsNotSetup));
        assert_eq!(stop(&h), Err(SessionError::CaptureSessionIsNotSetup));
        assert_eq!(refresh(&h), Err(SessionError::CaptureSessionIsNotSetup));
        assert!(h.engine.journal().is_empty());
        assert_eq!(h.manager.setup_result(), SetupResult::None);
    }

    #[test]
    fn redundant_start_and_stop_skip_engine() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Success);

        assert_eq!(start(&h), Ok(()));
        assert_eq!(start(&h), Ok(()));
        assert_eq!(h.engine.count_calls(&EngineCall::StartRunning), 1);

        assert_eq!(stop(&h), Ok(()));
        assert_eq!(stop(&h), Ok(()));
        assert_eq!(h.engine.count_calls(&EngineCall::StopRunning), 1);
        assert!(!h.manager.is_running());
    }

    #[test]
    fn running_state_follows_last_issued_call() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Success);

        let pattern = [true, true, false, true, false, false, true];
        let completed = Arc::new(Mutex::new(0usize));
        for &run in &pattern {
            let sink = Arc::clone(&completed);
            let done = move |result: Result<(), SessionError>| {
                assert_eq!(result, Ok(()));
                *sink.lock() += 1;
            };
            if run {
                h.manager.start_running(done);
            } else {
                h.manager.stop_running(done);
            }
        }

        assert!(h.run_loop.run_until(WAIT, || *completed.lock() == pattern.len()));
        assert!(h.manager.is_running());
        assert!(h.engine.is_running());
    }

    #[test]
    fn engine_refusing_to_start_or_stop_is_reported() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Success);

        h.engine.set_refuse_start(true);
        assert_eq!(start(&h), Err(SessionError::UnableToStartSession));
        assert_eq!(h.manager.setup_result(), SetupResult::Success);

        h.engine.set_refuse_start(false);
        assert_eq!(start(&h), Ok(()));

        h.engine.set_refuse_stop(true);
        assert_eq!(stop(&h), Err(SessionError::UnableToStopSession));
        assert!(h.manager.is_running());
    }

    #[test]
    fn refresh_while_running_swaps_input_live() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Success);
        assert_eq!(start(&h), Ok(()));
        let old = h.engine.attached_inputs()[0].clone();

        h.engine.set_default_device(Some(SimulatedDevice::usb_interface(2)));
        assert_eq!(refresh(&h), Ok(()));

        let inputs = h.engine.attached_inputs();
        assert_eq!(inputs.len(), 1);
        assert_ne!(inputs[0].id, old.id);
        assert_eq!(inputs[0].device, SimulatedDevice::usb_interface(2));
        assert!(h.manager.is_running());
        assert_eq!(h.engine.count_calls(&EngineCall::StopRunning), 0);
        assert_eq!(h.engine.transaction_depth(), 0);
        assert_eq!(h.engine.mutations_outside_transaction(), 0);
        assert_eq!(h.manager.diagnostics().input_swaps, 1);
    }

    #[test]
    fn failed_refresh_commits_and_can_be_retried() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Success);
        assert_eq!(start(&h), Ok(()));

        h.engine.set_default_device(None);
        assert_eq!(refresh(&h), Err(SessionError::UnableToCreateCaptureDevice));
        assert_eq!(h.engine.transaction_depth(), 0);
        assert!(h.engine.attached_inputs().is_empty());
        assert_eq!(h.manager.setup_result(), SetupResult::Success);

        h.engine.set_default_device(Some(SimulatedDevice::built_in_mic()));
        h.engine.set_fail_create_input(true);
        assert_eq!(refresh(&h), Err(SessionError::UnableToAddCaptureDeviceInput));

        h.engine.set_fail_create_input(false);
        assert_eq!(refresh(&h), Ok(()));
        assert_eq!(h.engine.attached_inputs().len(), 1);
    }

    #[test]
    fn completions_arrive_on_caller_context() {
        let h = harness(AuthorizationStatus::NotDetermined, true, Some(SimulatedDevice::built_in_mic()));
        let caller = thread::current().id();

        let (result, on) = wait_for(&h.run_loop, |done| h.manager.request_access_and_setup(done));
        assert_eq!(result, SetupResult::Success);
        assert_eq!(on, caller);

        let (_, on) = wait_for(&h.run_loop, |done| h.manager.start_running(done));
        assert_eq!(on, caller);

        let (_, on) = wait_for(&h.run_loop, |done| h.manager.refresh_audio(done));
        assert_eq!(on, caller);
    }

    #[test]
    fn channel_counts_reach_observer_per_buffer() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::usb_interface(4)));
        let caller = thread::current().id();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        h.manager.set_channel_count_observer(Arc::new(move |count: u32| {
            sink.lock().push((count, thread::current().id()));
        }));

        assert_eq!(setup(&h), SetupResult::Success);
        assert!(!h.engine.capture_buffer(), "nothing is captured before start");
        assert_eq!(start(&h), Ok(()));

        for _ in 0..3 {
            assert!(h.engine.capture_buffer());
        }
        assert!(h.run_loop.run_until(WAIT, || seen.lock().len() == 3));
        assert!(seen.lock().iter().all(|&(count, on)| count == 4 && on == caller));

        h.engine.set_default_device(Some(SimulatedDevice::built_in_mic()));
        assert_eq!(refresh(&h), Ok(()));
        assert!(h.engine.capture_buffer());
        assert!(h.run_loop.run_until(WAIT, || seen.lock().len() == 4));
        assert_eq!(seen.lock()[3].0, 1);

        let d = h.manager.diagnostics();
        assert_eq!(d.buffers_received, 4);
        assert_eq!(d.channel_counts_delivered, 4);
        assert_eq!(d.last_channel_count, Some(1));
    }

    #[test]
    fn coalescing_policy_bounds_notifications() {
        let configuration = SessionConfiguration {
            delivery_policy: DeliveryPolicy::Coalesce,
            ..Default::default()
        };
        let h = harness_with(
            AuthorizationStatus::Authorized,
            false,
            Some(SimulatedDevice::usb_interface(2)),
            configuration,
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        h.manager
            .set_channel_count_observer(Arc::new(move |count: u32| sink.lock().push(count)));

        assert_eq!(setup(&h), SetupResult::Success);
        assert_eq!(start(&h), Ok(()));
        for _ in 0..10 {
            assert!(h.engine.capture_buffer());
        }

        assert!(h
            .run_loop
            .run_until(WAIT, || h.manager.diagnostics().buffers_received == 10));
        h.run_loop.run_until(Duration::from_millis(50), || false);

        let seen = seen.lock().clone();
        assert!(!seen.is_empty());
        assert!(seen.len() <= 10);
        assert!(seen.iter().all(|&count| count == 2));
        let d = h.manager.diagnostics();
        assert_eq!(d.channel_counts_delivered + d.channel_counts_coalesced, 10);
    }

    #[test]
    fn engine_panic_during_setup_fails_setup() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        h.engine.set_panic_on_create_input(true);

        assert_eq!(setup(&h), SetupResult::Failed);
        assert_eq!(h.manager.setup_result(), SetupResult::Failed);
        assert_eq!(h.engine.transaction_depth(), 0);

        // The recorded result answers later callers without a second attempt.
        assert_eq!(setup(&h), SetupResult::Failed);
        assert_eq!(h.engine.count_calls(&EngineCall::BeginConfiguration), 1);
        assert_eq!(start(&h), Err(SessionError::CaptureSessionIsNotSetup));
    }

    #[test]
    fn engine_panic_during_start_completes_with_error() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Success);

        h.engine.set_panic_on_start(true);
        assert_eq!(start(&h), Err(SessionError::UnableToStartSession));
        assert!(!h.manager.is_running());

        h.engine.set_panic_on_start(false);
        assert_eq!(start(&h), Ok(()));
        assert!(h.manager.is_running());
    }

    #[test]
    fn refresh_that_loses_capture_is_an_error() {
        let h = harness(AuthorizationStatus::Authorized, false, Some(SimulatedDevice::built_in_mic()));
        assert_eq!(setup(&h), SetupResult::Success);
        assert_eq!(start(&h), Ok(()));

        h.engine.set_stop_on_input_change(true);
        h.engine.set_default_device(Some(SimulatedDevice::usb_interface(2)));
        assert_eq!(refresh(&h), Err(SessionError::UnableToAddCaptureDeviceInput));
        assert!(!h.manager.is_running());
        assert_eq!(h.manager.setup_result(), SetupResult::Success);

        h.engine.set_stop_on_input_change(false);
        assert_eq!(start(&h), Ok(()));
        assert!(h.manager.is_running());
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let run_loop = RunLoop::new();
        let context: Arc<dyn CallbackContext> = Arc::new(run_loop.handle());
        let gateway = Arc::new(SimulatedPermissionGateway::new(
            AuthorizationStatus::Authorized,
            true,
            Arc::clone(&context),
        ));
        let (engine, _handle) = SimulatedCaptureEngine::new(None);
        let configuration = SessionConfiguration {
            executor_label: String::new(),
            ..Default::default()
        };

        let result = CaptureSessionManager::new(engine, gateway, context, configuration);
        assert!(matches!(result, Err(SessionError::Configuration(_))));
    }
}
