//! The service coordination facade.
//!
//! One coordinator is constructed per process. It detects the init flavor
//! once, resolves providers lazily per flavor, wraps every lifecycle
//! operation with before/after hook dispatch, and owns the delayed-action
//! queue. The host application must call
//! [`drain_delayed_actions`](ServiceCoordinator::drain_delayed_actions)
//! exactly once, after all other work, before exiting.

use once_cell::sync::OnceCell;
use std::fs;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::delayed::{DelayedAction, DelayedActions, DelayedKind};
use crate::detect::{self, InitKind};
use crate::error::{Error, Result};
use crate::hooks::EventHooks;
use crate::provider::{self, ServiceProvider};

pub struct ServiceCoordinator {
    kind: InitKind,
    config: Config,
    hooks: EventHooks,
    providers: [OnceCell<Arc<dyn ServiceProvider>>; 3],
    delayed: Mutex<DelayedActions>,
}

impl std::fmt::Debug for ServiceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCoordinator")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ServiceCoordinator {
    pub fn new(config: Config) -> Result<Self> {
        let kind = if config.init == "auto" {
            detect::detect(&config.root)
        } else {
            InitKind::from_name(&config.init)
                .ok_or_else(|| Error::ProviderResolution(config.init.clone()))?
        };

        tracing::debug!("coordinating services through {}", kind);

        Ok(Self {
            kind,
            config,
            hooks: EventHooks::new(),
            providers: [OnceCell::new(), OnceCell::new(), OnceCell::new()],
            delayed: Mutex::new(DelayedActions::new()),
        })
    }

    /// The init flavor this coordinator drives. Fixed for the process.
    pub fn init_kind(&self) -> InitKind {
        self.kind
    }

    /// Hook registry fired around every lifecycle operation.
    pub fn hooks(&self) -> &EventHooks {
        &self.hooks
    }

    pub fn enable(&self, service: &str) -> Result<()> {
        self.lifecycle("enable", service, |p, s| p.enable(s))
    }

    pub fn disable(&self, service: &str) -> Result<()> {
        self.lifecycle("disable", service, |p, s| p.disable(s))
    }

    pub fn start(&self, service: &str) -> Result<()> {
        self.lifecycle("start", service, |p, s| p.start(s))
    }

    pub fn stop(&self, service: &str) -> Result<()> {
        self.lifecycle("stop", service, |p, s| p.stop(s))
    }

    pub fn restart(&self, service: &str) -> Result<()> {
        self.lifecycle("restart", service, |p, s| p.restart(s))
    }

    pub fn reload(&self, service: &str) -> Result<()> {
        self.lifecycle("reload", service, |p, s| p.reload(s))
    }

    /// Remove the service definition, sweeping stale definition files of
    /// the non-active flavors so that nothing survives an init-system
    /// migration.
    pub fn remove(&self, service: &str) -> Result<()> {
        let name = self.resolve_name(service)?;
        self.checkpoint("before", "remove", &name)?;

        let provider = self.provider_of(self.kind);
        provider
            .remove(&name)
            .map_err(|err| Error::operation("remove", &name, format!("{:#}", err)))?;

        if self.kind != InitKind::SysVInit {
            for flavor in [InitKind::Systemd, InitKind::Upstart] {
                if flavor == self.kind {
                    continue;
                }
                let other = self.provider_of(flavor);
                for path in other.definition_files(&name) {
                    match fs::remove_file(&path) {
                        Ok(()) => {
                            tracing::debug!("removed stale {} file {}", flavor, path.display())
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                        Err(err) => {
                            return Err(Error::operation(
                                "remove",
                                &name,
                                format!("failed to remove {}: {}", path.display(), err),
                            ));
                        }
                    }
                }
            }
        }

        self.checkpoint("after", "remove", &name)
    }

    pub fn is_enabled(&self, service: &str) -> Result<bool> {
        let name = self.resolve_name(service)?;
        Ok(self.provider_of(self.kind).is_enabled(&name))
    }

    /// Probe whether the service is running. A failing probe reports
    /// not-running instead of propagating: probing a service that does not
    /// exist must not abort the caller.
    pub fn is_running(&self, service: &str) -> Result<bool> {
        let name = self.resolve_name(service)?;
        match self.provider_of(self.kind).is_running(&name) {
            Ok(running) => Ok(running),
            Err(err) => {
                tracing::warn!("treating {} as not running: {:#}", name, err);
                Ok(false)
            }
        }
    }

    pub fn has_service(&self, service: &str) -> Result<bool> {
        let name = self.resolve_name(service)?;
        Ok(self.provider_of(self.kind).has_service(&name))
    }

    /// Resolve the provider for a flavor by name, or the active flavor's
    /// provider when no name is given.
    pub fn provider(&self, flavor: Option<&str>) -> Result<Arc<dyn ServiceProvider>> {
        let kind = match flavor {
            None => self.kind,
            Some(name) => InitKind::from_name(name)
                .ok_or_else(|| Error::ProviderResolution(name.to_string()))?,
        };
        Ok(self.provider_of(kind))
    }

    /// Defer a lifecycle action until [`drain_delayed_actions`]. Repeated
    /// requests for the same service coalesce to the strongest action.
    ///
    /// [`drain_delayed_actions`]: ServiceCoordinator::drain_delayed_actions
    pub fn register_delayed_action(
        &self,
        service: &str,
        action: DelayedAction,
        priority: u32,
    ) -> Result<()> {
        let name = self.resolve_name(service)?;
        self.delayed.lock().unwrap().register(&name, action, priority)
    }

    /// Replay all deferred actions, highest priority first. Required
    /// integration point: the host's main flow calls this exactly once,
    /// after all other work, before process exit.
    pub fn drain_delayed_actions(&self) -> Result<()> {
        let mut queue = self.delayed.lock().unwrap().take();
        queue.drain(|service, kind| {
            let outcome = match kind {
                DelayedKind::Start => self.start(service),
                DelayedKind::Reload => self.reload(service),
                DelayedKind::Restart => self.restart(service),
            };
            outcome.map_err(anyhow::Error::from)
        })
    }

    fn lifecycle<F>(&self, op: &'static str, service: &str, call: F) -> Result<()>
    where
        F: FnOnce(&dyn ServiceProvider, &str) -> anyhow::Result<()>,
    {
        let name = self.resolve_name(service)?;
        self.checkpoint("before", op, &name)?;

        let provider = self.provider_of(self.kind);
        call(provider.as_ref(), &name)
            .map_err(|err| Error::operation(op, &name, format!("{:#}", err)))?;

        self.checkpoint("after", op, &name)
    }

    fn checkpoint(&self, stage: &str, op: &'static str, service: &str) -> Result<()> {
        let event = format!("{}_{}", stage, op);
        if self.hooks.trigger(&event, service) != 0 {
            let cause = self
                .hooks
                .last_error()
                .unwrap_or_else(|| "unknown error".into());
            return Err(Error::operation(op, service, cause));
        }
        Ok(())
    }

    fn resolve_name(&self, service: &str) -> Result<String> {
        if service.is_empty() {
            return Err(Error::Configuration("service name must not be empty".into()));
        }

        Ok(self
            .config
            .aliases
            .get(service)
            .cloned()
            .unwrap_or_else(|| service.to_string()))
    }

    fn provider_of(&self, kind: InitKind) -> Arc<dyn ServiceProvider> {
        self.providers[kind.index()]
            .get_or_init(|| provider::resolve(kind, &self.config.root))
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn set_provider(&self, kind: InitKind, provider: Arc<dyn ServiceProvider>) {
        if self.providers[kind.index()].set(provider).is_err() {
            panic!("provider for {} already resolved", kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[derive(Default, Debug)]
    struct MockProvider {
        calls: Mutex<Vec<String>>,
        fail_verb: Option<&'static str>,
        probe_fails: bool,
    }

    impl MockProvider {
        fn failing_on(verb: &'static str) -> Self {
            Self {
                fail_verb: Some(verb),
                ..Default::default()
            }
        }

        fn record(&self, verb: &str, service: &str) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", verb, service));
            if self.fail_verb == Some(verb) {
                anyhow::bail!("{} refused by provider", verb);
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ServiceProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }
        fn is_enabled(&self, _service: &str) -> bool {
            true
        }
        fn enable(&self, service: &str) -> anyhow::Result<()> {
            self.record("enable", service)
        }
        fn disable(&self, service: &str) -> anyhow::Result<()> {
            self.record("disable", service)
        }
        fn remove(&self, service: &str) -> anyhow::Result<()> {
            self.record("remove", service)
        }
        fn start(&self, service: &str) -> anyhow::Result<()> {
            self.record("start", service)
        }
        fn stop(&self, service: &str) -> anyhow::Result<()> {
            self.record("stop", service)
        }
        fn restart(&self, service: &str) -> anyhow::Result<()> {
            self.record("restart", service)
        }
        fn reload(&self, service: &str) -> anyhow::Result<()> {
            self.record("reload", service)
        }
        fn is_running(&self, service: &str) -> anyhow::Result<bool> {
            if self.probe_fails {
                anyhow::bail!("Unknown service: {}", service);
            }
            Ok(true)
        }
        fn has_service(&self, _service: &str) -> bool {
            true
        }
        fn definition_files(&self, _service: &str) -> Vec<PathBuf> {
            Vec::new()
        }
    }

    fn coordinator_with_mock(mock: Arc<MockProvider>) -> ServiceCoordinator {
        let coordinator = ServiceCoordinator::new(Config {
            init: "systemd".into(),
            ..Config::default()
        })
        .unwrap();
        coordinator.set_provider(InitKind::Systemd, mock);
        coordinator
    }

    #[test]
    fn start_runs_provider_between_hooks() {
        let mock = Arc::new(MockProvider::default());
        let coordinator = coordinator_with_mock(Arc::clone(&mock));

        let order = Arc::new(Mutex::new(Vec::new()));
        for event in ["before_start", "after_start"] {
            let sink = Arc::clone(&order);
            coordinator.hooks().register(event, move |service| {
                sink.lock().unwrap().push(format!("{}:{}", event, service));
                Ok(())
            });
        }

        coordinator.start("postfix").unwrap();

        assert_eq!(mock.calls(), vec!["start:postfix"]);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["before_start:postfix", "after_start:postfix"]
        );
    }

    #[test]
    fn before_hook_veto_blocks_the_provider() {
        let mock = Arc::new(MockProvider::default());
        let coordinator = coordinator_with_mock(Arc::clone(&mock));
        coordinator
            .hooks()
            .register("before_stop", |_| anyhow::bail!("maintenance window"));

        let err = coordinator.stop("mysql").unwrap_err();

        assert!(mock.calls().is_empty());
        let msg = err.to_string();
        assert!(msg.contains("stop"), "{}", msg);
        assert!(msg.contains("mysql"), "{}", msg);
        assert!(msg.contains("maintenance window"), "{}", msg);
    }

    #[test]
    fn after_hook_veto_fails_the_operation() {
        let mock = Arc::new(MockProvider::default());
        let coordinator = coordinator_with_mock(Arc::clone(&mock));
        coordinator
            .hooks()
            .register("after_reload", |_| anyhow::bail!("postcheck failed"));

        let err = coordinator.reload("nginx").unwrap_err();

        // The provider did run; only the aftermath failed
        assert_eq!(mock.calls(), vec!["reload:nginx"]);
        assert!(err.to_string().contains("postcheck failed"));
    }

    #[test]
    fn provider_failure_carries_operation_context() {
        let mock = Arc::new(MockProvider::failing_on("restart"));
        let coordinator = coordinator_with_mock(Arc::clone(&mock));

        let err = coordinator.restart("proftpd").unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("restart"), "{}", msg);
        assert!(msg.contains("proftpd"), "{}", msg);
        assert!(msg.contains("refused by provider"), "{}", msg);
    }

    #[test]
    fn aliases_apply_to_provider_and_hooks() {
        let mock = Arc::new(MockProvider::default());
        let coordinator = ServiceCoordinator::new(Config {
            init: "systemd".into(),
            aliases: [("mta".to_string(), "postfix".to_string())].into(),
            ..Config::default()
        })
        .unwrap();
        coordinator.set_provider(InitKind::Systemd, mock.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        coordinator.hooks().register("before_start", move |service| {
            sink.lock().unwrap().push(service.to_string());
            Ok(())
        });

        coordinator.start("mta").unwrap();

        assert_eq!(mock.calls(), vec!["start:postfix"]);
        assert_eq!(*seen.lock().unwrap(), vec!["postfix"]);
    }

    #[test]
    fn empty_service_name_is_a_configuration_error() {
        let mock = Arc::new(MockProvider::default());
        let coordinator = coordinator_with_mock(mock);

        assert!(matches!(
            coordinator.start("").unwrap_err(),
            Error::Configuration(_)
        ));
    }

    #[test]
    fn failing_probe_reports_not_running() {
        let mock = Arc::new(MockProvider {
            probe_fails: true,
            ..Default::default()
        });
        let coordinator = coordinator_with_mock(mock);

        assert!(!coordinator.is_running("ghost").unwrap());
    }

    #[test]
    fn unknown_flavor_is_a_resolution_error() {
        let err = ServiceCoordinator::new(Config {
            init: "launchd".into(),
            ..Config::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::ProviderResolution(_)));

        let mock = Arc::new(MockProvider::default());
        let coordinator = coordinator_with_mock(mock);
        assert!(matches!(
            coordinator.provider(Some("launchd")).unwrap_err(),
            Error::ProviderResolution(_)
        ));
    }

    #[test]
    fn remove_sweeps_stale_upstart_files() {
        let root = tempfile::tempdir().unwrap();
        let job_dir = root.path().join("etc/init");
        fs::create_dir_all(&job_dir).unwrap();
        fs::write(job_dir.join("ftpd.conf"), "exec /usr/sbin/ftpd\n").unwrap();
        fs::write(job_dir.join("ftpd.override"), "manual\n").unwrap();

        let mock = Arc::new(MockProvider::default());
        let coordinator = ServiceCoordinator::new(Config {
            init: "systemd".into(),
            root: root.path().to_path_buf(),
            ..Config::default()
        })
        .unwrap();
        coordinator.set_provider(InitKind::Systemd, mock.clone());

        coordinator.remove("ftpd").unwrap();

        assert_eq!(mock.calls(), vec!["remove:ftpd"]);
        assert!(!job_dir.join("ftpd.conf").exists());
        assert!(!job_dir.join("ftpd.override").exists());

        // Absent files must not fail a later remove
        coordinator.remove("ftpd").unwrap();
    }

    #[test]
    fn deferred_requests_coalesce_to_one_restart() {
        let mock = Arc::new(MockProvider::default());
        let coordinator = coordinator_with_mock(Arc::clone(&mock));

        coordinator
            .register_delayed_action("mta", DelayedAction::Lifecycle(DelayedKind::Start), 0)
            .unwrap();
        coordinator
            .register_delayed_action("mta", DelayedAction::Lifecycle(DelayedKind::Restart), 0)
            .unwrap();

        coordinator.drain_delayed_actions().unwrap();

        assert_eq!(mock.calls(), vec!["restart:mta"]);
    }

    #[test]
    fn drain_failure_names_the_failing_service() {
        let mock = Arc::new(MockProvider::failing_on("reload"));
        let coordinator = coordinator_with_mock(Arc::clone(&mock));

        coordinator
            .register_delayed_action("good", DelayedAction::Lifecycle(DelayedKind::Start), 10)
            .unwrap();
        coordinator
            .register_delayed_action("bad", DelayedAction::Lifecycle(DelayedKind::Reload), 5)
            .unwrap();
        coordinator
            .register_delayed_action("never", DelayedAction::Lifecycle(DelayedKind::Start), 1)
            .unwrap();

        let err = coordinator.drain_delayed_actions().unwrap_err();

        match err {
            Error::Drain {
                service, applied, ..
            } => {
                assert_eq!(service, "bad");
                assert_eq!(applied, vec!["good"]);
            }
            other => panic!("unexpected error: {}", other),
        }

        assert_eq!(mock.calls(), vec!["start:good", "reload:bad"]);
    }
}
