//! Mock container runtime for testing

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::{RuntimeError, RuntimeResult};
use crate::domain::models::{ContainerId, ContainerSpec, ExecOutput};
use crate::domain::ports::ContainerRuntime;

type SpecPredicate = Box<dyn Fn(&ContainerSpec) -> bool + Send + Sync>;
type StartHook = Box<dyn Fn(&ContainerSpec) + Send + Sync>;

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Create { image: String, command: Vec<String> },
    Start(ContainerId),
    Stop(ContainerId),
    Remove { id: ContainerId, volumes: bool, force: bool },
    Exec { id: ContainerId, command: Vec<String> },
}

#[derive(Debug)]
struct MockContainer {
    spec: ContainerSpec,
    running: bool,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    containers: HashMap<ContainerId, MockContainer>,
    calls: Vec<RuntimeCall>,
    exec_results: VecDeque<ExecOutput>,
}

/// Mock container runtime implementation for testing
///
/// Containers live in a map; ids are sequential (`mock-000001`, ...).
#[derive(Default)]
pub struct MockContainerRuntime {
    state: Mutex<MockState>,
    latency: Option<Duration>,
    fail_create: Option<SpecPredicate>,
    fail_start: Option<SpecPredicate>,
    fail_stop: Option<SpecPredicate>,
    fail_remove: Option<SpecPredicate>,
    on_start: Option<StartHook>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, so concurrent callers overlap.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn fail_create_if(
        mut self,
        pred: impl Fn(&ContainerSpec) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_create = Some(Box::new(pred));
        self
    }

    #[must_use]
    pub fn fail_start_if(
        mut self,
        pred: impl Fn(&ContainerSpec) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_start = Some(Box::new(pred));
        self
    }

    #[must_use]
    pub fn fail_stop_if(
        mut self,
        pred: impl Fn(&ContainerSpec) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_stop = Some(Box::new(pred));
        self
    }

    #[must_use]
    pub fn fail_remove_if(
        mut self,
        pred: impl Fn(&ContainerSpec) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_remove = Some(Box::new(pred));
        self
    }

    /// Run `hook` every time a container starts successfully.
    #[must_use]
    pub fn on_start(mut self, hook: impl Fn(&ContainerSpec) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Queue the result of the next `exec`; unqueued calls succeed silently.
    pub fn push_exec_result(&self, output: ExecOutput) {
        self.lock().exec_results.push_back(output);
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    /// Specs of every container started so far, in start order.
    pub fn started_specs(&self) -> Vec<ContainerSpec> {
        let state = self.lock();
        state
            .calls
            .iter()
            .filter_map(|call| match call {
                RuntimeCall::Start(id) => state.containers.get(id).map(|c| c.spec.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn start_count(&self) -> usize {
        self.count(|call| matches!(call, RuntimeCall::Start(_)))
    }

    pub fn stop_calls_for(&self, id: &ContainerId) -> usize {
        self.count(|call| matches!(call, RuntimeCall::Stop(stopped) if stopped == id))
    }

    pub fn exec_count(&self) -> usize {
        self.count(|call| matches!(call, RuntimeCall::Exec { .. }))
    }

    /// Containers created and not yet removed.
    pub fn existing(&self) -> Vec<ContainerId> {
        let mut ids: Vec<_> = self.lock().containers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn running_images(&self) -> Vec<String> {
        let mut images: Vec<_> = self
            .lock()
            .containers
            .values()
            .filter(|c| c.running)
            .map(|c| c.spec.image.clone())
            .collect();
        images.sort();
        images
    }

    pub fn spec_of(&self, id: &ContainerId) -> Option<ContainerSpec> {
        self.lock().containers.get(id).map(|c| c.spec.clone())
    }

    /// Highest number of calls observed in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn count(&self, pred: impl Fn(&RuntimeCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn spec_for(&self, id: &ContainerId) -> RuntimeResult<ContainerSpec> {
        self.lock()
            .containers
            .get(id)
            .map(|c| c.spec.clone())
            .ok_or_else(|| RuntimeError::UnknownContainer(id.clone()))
    }

    fn scripted_failure(
        pred: Option<&SpecPredicate>,
        spec: &ContainerSpec,
        op: &str,
    ) -> RuntimeResult<()> {
        match pred {
            Some(pred) if pred(spec) => Err(RuntimeError::Other(format!(
                "scripted {op} failure for {}",
                spec.image
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ContainerRuntime for MockContainerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerId> {
        self.enter().await;
        self.lock().calls.push(RuntimeCall::Create {
            image: spec.image.clone(),
            command: spec.command.clone(),
        });
        let result = Self::scripted_failure(self.fail_create.as_ref(), spec, "create").map(|()| {
            let mut state = self.lock();
            state.next_id += 1;
            let id = ContainerId::new(format!("mock-{:06}", state.next_id));
            state.containers.insert(
                id.clone(),
                MockContainer {
                    spec: spec.clone(),
                    running: false,
                },
            );
            id
        });
        self.leave();
        result
    }

    async fn start(&self, id: &ContainerId) -> RuntimeResult<()> {
        self.enter().await;
        self.lock().calls.push(RuntimeCall::Start(id.clone()));
        let result = self.spec_for(id).and_then(|spec| {
            Self::scripted_failure(self.fail_start.as_ref(), &spec, "start")?;
            if let Some(c) = self.lock().containers.get_mut(id) {
                c.running = true;
            }
            if let Some(hook) = &self.on_start {
                hook(&spec);
            }
            Ok(())
        });
        self.leave();
        result
    }

    async fn stop(&self, id: &ContainerId, _timeout: Duration) -> RuntimeResult<()> {
        self.enter().await;
        self.lock().calls.push(RuntimeCall::Stop(id.clone()));
        let result = self.spec_for(id).and_then(|spec| {
            Self::scripted_failure(self.fail_stop.as_ref(), &spec, "stop")?;
            if let Some(c) = self.lock().containers.get_mut(id) {
                c.running = false;
            }
            Ok(())
        });
        self.leave();
        result
    }

    async fn remove(
        &self,
        id: &ContainerId,
        remove_volumes: bool,
        force: bool,
    ) -> RuntimeResult<()> {
        self.enter().await;
        self.lock().calls.push(RuntimeCall::Remove {
            id: id.clone(),
            volumes: remove_volumes,
            force,
        });
        let result = self.spec_for(id).and_then(|spec| {
            Self::scripted_failure(self.fail_remove.as_ref(), &spec, "remove")?;
            self.lock().containers.remove(id);
            Ok(())
        });
        self.leave();
        result
    }

    async fn exec(&self, id: &ContainerId, command: &[String]) -> RuntimeResult<ExecOutput> {
        self.enter().await;
        let result = {
            let mut state = self.lock();
            state.calls.push(RuntimeCall::Exec {
                id: id.clone(),
                command: command.to_vec(),
            });
            if state.containers.contains_key(id) {
                Ok(state.exec_results.pop_front().unwrap_or_default())
            } else {
                Err(RuntimeError::UnknownContainer(id.clone()))
            }
        };
        self.leave();
        result
    }
}
