//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::image::ImageDescriptor;
use crate::provider::{ImageProvider, ProviderError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
/// Clones share the same script and invocation log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Provider call recorded by [`FakeProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderCall {
    /// `list_owned_images` was invoked.
    List,
    /// `deregister_image` was invoked with this image id.
    Deregister(String),
    /// `delete_snapshot` was invoked with this snapshot id.
    DeleteSnapshot(String),
}

#[derive(Debug, Default)]
struct FakeState {
    images: Vec<ImageDescriptor>,
    list_failure: Option<ProviderError>,
    failing_images: BTreeSet<String>,
    failing_snapshots: BTreeSet<String>,
    calls: Vec<ProviderCall>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory [`ImageProvider`] with failure injection.
///
/// Clones share state so a test can keep a handle while the cleaner owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
    call_delay: Duration,
}

impl FakeProvider {
    /// Creates a provider that lists `images`.
    #[must_use]
    pub fn with_images(images: Vec<ImageDescriptor>) -> Self {
        let provider = Self::default();
        lock(&provider.state).images = images;
        provider
    }

    /// Makes every deletion call sleep for `delay`, widening the window in
    /// which workers overlap.
    #[must_use]
    pub const fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Makes `list_owned_images` fail with `error`.
    pub fn fail_listing(&self, error: ProviderError) {
        lock(&self.state).list_failure = Some(error);
    }

    /// Makes deregistration of `image_id` fail.
    pub fn fail_image(&self, image_id: &str) {
        lock(&self.state).failing_images.insert(image_id.to_owned());
    }

    /// Makes deletion of `snapshot_id` fail.
    pub fn fail_snapshot(&self, snapshot_id: &str) {
        lock(&self.state)
            .failing_snapshots
            .insert(snapshot_id.to_owned());
    }

    /// Returns every call recorded so far, in the order they started.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.state).calls.clone()
    }

    /// Returns the ids passed to `deregister_image`.
    #[must_use]
    pub fn deregistered(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Deregister(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Returns the ids passed to `delete_snapshot`.
    #[must_use]
    pub fn deleted_snapshots(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::DeleteSnapshot(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Returns the highest number of deletion calls observed in flight at
    /// once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        lock(&self.state).max_in_flight
    }

    fn mutate(&self, call: ProviderCall, failing: bool) -> Result<(), ProviderError> {
        let (action, resource_id) = match &call {
            ProviderCall::Deregister(id) => ("image delete", id.clone()),
            ProviderCall::DeleteSnapshot(id) => ("snapshot delete", id.clone()),
            ProviderCall::List => ("image list", String::new()),
        };
        {
            let mut state = lock(&self.state);
            state.calls.push(call);
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        if !self.call_delay.is_zero() {
            thread::sleep(self.call_delay);
        }
        lock(&self.state).in_flight -= 1;

        if failing {
            return Err(ProviderError::Rejected {
                action: action.to_owned(),
                resource_id,
                message: String::from("simulated failure"),
            });
        }
        Ok(())
    }
}

impl ImageProvider for FakeProvider {
    fn list_owned_images(&self) -> Result<Vec<ImageDescriptor>, ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(ProviderCall::List);
        match &state.list_failure {
            Some(err) => Err(err.clone()),
            None => Ok(state.images.clone()),
        }
    }

    fn deregister_image(&self, image_id: &str) -> Result<(), ProviderError> {
        let failing = lock(&self.state).failing_images.contains(image_id);
        self.mutate(ProviderCall::Deregister(image_id.to_owned()), failing)
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError> {
        let failing = lock(&self.state).failing_snapshots.contains(snapshot_id);
        self.mutate(ProviderCall::DeleteSnapshot(snapshot_id.to_owned()), failing)
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    #[must_use]
    pub fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = lock(&ENV_LOCK);
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Produces one image entry matching `scw instance image list -o json`.
///
/// `root_snapshot` becomes the root volume id and `extra_snapshots` fill
/// the extra volume slots starting at `1`.
#[must_use]
pub fn json_image(
    id: &str,
    name: &str,
    creation_date: &str,
    root_snapshot: Option<&str>,
    extra_snapshots: &[&str],
) -> String {
    let root = root_snapshot.map_or_else(
        || String::from("null"),
        |snapshot| format!("{{\"id\":\"{snapshot}\",\"volume_type\":\"l_ssd\"}}"),
    );
    let extra = extra_snapshots
        .iter()
        .enumerate()
        .map(|(index, snapshot)| {
            format!(
                "\"{}\":{{\"id\":\"{snapshot}\",\"volume_type\":\"l_ssd\"}}",
                index + 1
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{{\"id\":\"{id}\",\"name\":\"{name}\",\"creation_date\":\"{creation_date}\",\
         \"root_volume\":{root},\"extra_volumes\":{{{extra}}},\"state\":\"available\"}}"
    )
}

/// Wraps image entries in the paginated envelope emitted by `scw`.
#[must_use]
pub fn json_images(images: &[String]) -> String {
    format!(
        "{{\"images\":[{}],\"total_count\":{}}}",
        images.join(","),
        images.len()
    )
}
