//! Recording host for tests

use super::{CommandOutput, Host, Invocation};
use crate::error::{ProvisionError, ProvisionResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

type Handler = Box<dyn Fn(&FakeHost, &Invocation) -> Option<CommandOutput> + Send + Sync>;

/// Records every invocation; commands succeed with empty output unless the
/// handler answers otherwise
pub struct FakeHost {
    calls: Mutex<Vec<Invocation>>,
    commands: Mutex<HashSet<String>>,
    uid: u32,
    country: Option<String>,
    handler: Handler,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            commands: Mutex::new(HashSet::new()),
            uid: 0,
            country: None,
            handler: Box::new(|_, _| None),
        }
    }

    pub fn with_commands(self, names: &[&str]) -> Self {
        for name in names {
            self.add_command(name);
        }
        self
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    pub fn with_country(mut self, body: &str) -> Self {
        self.country = Some(body.to_string());
        self
    }

    pub fn on(
        mut self,
        handler: impl Fn(&FakeHost, &Invocation) -> Option<CommandOutput> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn add_command(&self, name: &str) {
        self.commands.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in call order
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::display).collect()
    }

    /// Number of calls whose rendered line starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.lines().iter().filter(|l| l.starts_with(prefix)).count()
    }
}

/// Script passed to `bash -c`, if this is a shell invocation
pub fn script(invocation: &Invocation) -> Option<&str> {
    if invocation.program == "bash" && invocation.args.first().map(String::as_str) == Some("-c") {
        invocation.args.get(1).map(String::as_str)
    } else {
        None
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn run(&self, invocation: &Invocation) -> ProvisionResult<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.handler)(self, invocation).unwrap_or_default())
    }

    fn effective_uid(&self) -> u32 {
        self.uid
    }

    async fn fetch_text(&self, url: &str, _timeout: Duration) -> ProvisionResult<String> {
        self.country
            .clone()
            .ok_or_else(|| ProvisionError::Lookup(format!("{}: offline", url)))
    }

    async fn command_exists(&self, name: &str) -> bool {
        self.commands.lock().unwrap().contains(name)
    }
}
