use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use logviewer_archive::ExtractOptions;
use logviewer_fetch::{Acquired, FetchOptions, Sha256Digest, Source};
use logviewer_platform::env::PathModifier;
use logviewer_platform::{
    BrowserOpener, Component, ComponentStrategy, EnvSpec, InstallMethod, PlatformId,
    PlatformProfile, ReadinessTarget,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ProvisionConfig;
use crate::effects::{Acquire, Launch, OpenBrowser, SystemAcquire, SystemBrowser, SystemLaunch};
use crate::env::LaunchEnv;
use crate::error::{ProvisionError, Result};
use crate::readiness::{ProbeFactory, SystemProbes, WaitError, wait_until_ready};
use crate::rollback::Journal;
use crate::state::{State, StateObserver};

/// Downloads land here, relative to the install root.
pub const STAGING_DIR_NAME: &str = ".staging";

/// Everything a run will do, resolved without touching the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub platform: PlatformId,
    pub install_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub components: Vec<PlannedComponent>,
    pub env: EnvSpec,
    pub browser: BrowserOpener,
    pub dashboard_url: String,
    pub open_browser: bool,
    pub rollback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedComponent {
    #[serde(flatten)]
    pub strategy: ComponentStrategy,
    #[serde(serialize_with = "display")]
    pub source: Source,
    #[serde(serialize_with = "display_opt")]
    pub checksum: Option<Sha256Digest>,
}

impl PlannedComponent {
    pub fn component(&self) -> Component {
        self.strategy.component
    }

    /// Where the component lives once installed, if it unpacks under the root.
    pub fn install_path(&self, install_dir: &Path) -> Option<PathBuf> {
        self.strategy.home.as_ref().map(|home| install_dir.join(home))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub platform: PlatformId,
    pub install_dir: PathBuf,
    pub components: Vec<InstalledComponent>,
    pub dashboard_url: String,
    pub browser_opened: bool,
}

impl RunReport {
    pub fn component(&self, component: Component) -> Option<&InstalledComponent> {
        self.components.iter().find(|c| c.component == component)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledComponent {
    pub component: Component,
    pub path: Option<PathBuf>,
    pub downloaded: bool,
    pub pid: Option<u32>,
    pub ready_after: Option<Duration>,
}

/// Drives a provisioning run through its states.
pub struct Provisioner {
    config: ProvisionConfig,
    acquirer: Box<dyn Acquire>,
    launcher: Box<dyn Launch>,
    browser: Box<dyn OpenBrowser>,
    probes: Box<dyn ProbeFactory>,
    base_path: Option<PathModifier>,
    observer: Option<StateObserver>,
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// A provisioner acting on the real system.
    pub fn new(config: ProvisionConfig) -> Self {
        Self {
            acquirer: Box::new(SystemAcquire {
                progress: config.download.progress,
            }),
            launcher: Box::new(SystemLaunch),
            browser: Box::new(SystemBrowser),
            probes: Box::new(SystemProbes {
                mode: config.readiness.mode,
            }),
            base_path: None,
            observer: None,
            config,
        }
    }

    pub fn acquirer(mut self, acquirer: impl Acquire + 'static) -> Self {
        self.acquirer = Box::new(acquirer);
        self
    }

    pub fn launcher(mut self, launcher: impl Launch + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn browser(mut self, browser: impl OpenBrowser + 'static) -> Self {
        self.browser = Box::new(browser);
        self
    }

    pub fn probes(mut self, probes: impl ProbeFactory + 'static) -> Self {
        self.probes = Box::new(probes);
        self
    }

    /// PATH that platform additions extend. Defaults to this process's PATH.
    pub fn base_path(mut self, path: PathModifier) -> Self {
        self.base_path = Some(path);
        self
    }

    pub fn observer(mut self, observer: impl Fn(&State) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Resolve the platform, paths and sources. Performs no I/O.
    pub fn plan(&self) -> Result<Plan> {
        let mut profile = match &self.config.platform {
            Some(id) => PlatformProfile::resolve(id),
            None => PlatformProfile::detect(),
        }
        .map_err(ProvisionError::UnsupportedPlatform)?;

        let dashboard_url = self
            .config
            .dashboard_url
            .clone()
            .unwrap_or_else(|| profile.dashboard_url.clone());
        if let Some(dashboard) = profile.component_mut(Component::Dashboard)
            && let Some(spec) = dashboard.readiness.as_mut()
            && let ReadinessTarget::Http { url } = &mut spec.target
        {
            url.clone_from(&dashboard_url);
        }

        let install_dir = self.config.resolve_install_dir()?;
        let staging_dir = install_dir.join(STAGING_DIR_NAME);
        let source_dir = self.config.resolve_source_dir()?;

        let mut components = Vec::with_capacity(profile.components.len());
        for mut strategy in profile.components {
            let component = strategy.component;
            let overrides = self.config.source(component);

            let location = overrides.source.as_deref().unwrap_or(&strategy.artifact);
            let source = Source::parse(location, &source_dir)
                .map_err(|e| ProvisionError::setting(format!("{}.source", component.key()), e))?;
            let checksum = overrides
                .sha256
                .as_deref()
                .map(str::parse::<Sha256Digest>)
                .transpose()
                .map_err(|e| ProvisionError::setting(format!("{}.sha256", component.key()), e))?;
            if let (Some(secs), Some(spec)) = (overrides.timeout_secs, strategy.readiness.as_mut()) {
                spec.timeout = Duration::from_secs(secs);
            }

            components.push(PlannedComponent {
                strategy,
                source,
                checksum,
            });
        }

        Ok(Plan {
            platform: profile.platform,
            install_dir,
            staging_dir,
            components,
            env: profile.env,
            browser: profile.browser,
            dashboard_url,
            open_browser: self.config.open_browser,
            rollback: self.config.rollback,
        })
    }

    /// Run every stage. On failure the rollback journal is unwound before
    /// the error is returned.
    pub fn run(&self) -> Result<RunReport> {
        let mut journal = Journal::new(self.config.rollback);
        match self.execute(&mut journal) {
            Ok(report) => {
                journal.commit();
                self.transition(State::Done);
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "provisioning failed");
                let failures = journal.unwind();
                if failures > 0 {
                    warn!(failures, "rollback incomplete");
                }
                self.transition(State::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn transition(&self, state: State) {
        info!(state = %state, "provisioning state");
        if let Some(observer) = &self.observer {
            observer(&state);
        }
    }

    fn execute(&self, journal: &mut Journal) -> Result<RunReport> {
        self.transition(State::Init);
        let plan = self.plan()?;
        let root = &plan.install_dir;
        if !root.exists() {
            fs::create_dir_all(root).map_err(ProvisionError::io(root))?;
            journal.remove_on_failure(root.clone());
        }
        info!(platform = %plan.platform, install_dir = %root.display(), "provisioning");

        self.transition(State::Acquiring);
        let artifacts = self.acquire_all(&plan, journal)?;

        self.transition(State::Extracting);
        for (planned, artifact) in plan.components.iter().zip(&artifacts) {
            self.install(&plan, planned, artifact, journal)?;
        }
        clean_staging(&plan.staging_dir);

        self.transition(State::Configuring);
        let base_path = self.base_path.clone().unwrap_or_else(PathModifier::from_env);
        let env = LaunchEnv::derive(&plan.env, root, base_path)?;
        debug!(?env, "launch environment");

        let mut components: Vec<InstalledComponent> = plan
            .components
            .iter()
            .zip(&artifacts)
            .map(|(planned, artifact)| InstalledComponent {
                component: planned.component(),
                path: planned.install_path(root),
                downloaded: artifact.downloaded,
                pid: None,
                ready_after: None,
            })
            .collect();

        for (planned, installed) in plan.components.iter().zip(components.iter_mut()) {
            let Some(template) = &planned.strategy.launch else {
                continue;
            };
            let component = planned.component();
            self.transition(State::Launching(component));
            let working_dir = installed.path.clone().unwrap_or_else(|| root.clone());
            let command = env.apply(template.command(&working_dir));
            info!(%component, command = command.describe(), cwd = %working_dir.display(), "launching");
            let process = self
                .launcher
                .spawn(component, command)
                .map_err(|source| ProvisionError::ProcessLaunch { component, source })?;
            installed.pid = Some(process.id());
            journal.track_process(component, process);

            self.transition(State::AwaitingReady(component));
            let Some(spec) = &planned.strategy.readiness else {
                continue;
            };
            let readiness = |source| ProvisionError::Readiness { component, source };
            let mut probe = self
                .probes
                .probe(spec)
                .map_err(|e| readiness(WaitError::Probe(e)))?;
            let policy = self.config.wait_policy(spec.timeout);
            info!(%component, probe = %spec.target, timeout = ?spec.timeout, "waiting for readiness");
            let ready = wait_until_ready(probe.as_mut(), &policy, journal.process_mut(component))
                .map_err(readiness)?;
            info!(%component, attempts = ready.attempts, elapsed = ?ready.elapsed, "ready");
            installed.ready_after = Some(ready.elapsed);
        }

        self.transition(State::Activating);
        let browser_opened = self.activate(&plan);

        Ok(RunReport {
            platform: plan.platform,
            install_dir: plan.install_dir.clone(),
            components,
            dashboard_url: plan.dashboard_url.clone(),
            browser_opened,
        })
    }

    fn acquire_all(&self, plan: &Plan, journal: &mut Journal) -> Result<Vec<Acquired>> {
        let staging = &plan.staging_dir;
        if plan.components.iter().any(|c| c.source.is_remote()) && !staging.exists() {
            journal.remove_on_failure(staging.clone());
        }

        let mut artifacts = Vec::with_capacity(plan.components.len());
        for planned in &plan.components {
            let component = planned.component();
            let options = FetchOptions::default()
                .checksum(planned.checksum)
                .max_retries(self.config.download.max_retries);
            info!(%component, source = %planned.source, "acquiring");
            let acquired = self
                .acquirer
                .acquire(component, &planned.source, staging, options)
                .map_err(|source| ProvisionError::Transfer { component, source })?;
            debug!(%component, path = %acquired.path.display(), downloaded = acquired.downloaded, "acquired");
            artifacts.push(acquired);
        }
        Ok(artifacts)
    }

    fn install(
        &self,
        plan: &Plan,
        planned: &PlannedComponent,
        artifact: &Acquired,
        journal: &mut Journal,
    ) -> Result<()> {
        let component = planned.component();
        let root = &plan.install_dir;
        match &planned.strategy.install {
            InstallMethod::Archive { format } => {
                let before = top_level_entries(root)?;
                let result = logviewer_archive::extract_file(
                    &artifact.path,
                    Some(*format),
                    root,
                    &ExtractOptions::default(),
                );
                // Record what appeared even when extraction stopped half way.
                record_new_entries(root, &before, journal);
                let report = result.map_err(|source| ProvisionError::Extraction { component, source })?;
                info!(
                    %component,
                    entries = report.entry_count,
                    bytes = report.total_bytes,
                    skipped = report.skipped.len(),
                    "extracted"
                );
                debug!(%component, top_level = ?report.top_level_names(), "archive layout");
            }
            install @ InstallMethod::NativeInstaller { .. } => {
                let Some(command) = install.installer_command(&artifact.path) else {
                    return Ok(());
                };
                info!(%component, command = command.describe(), "running installer");
                let exited = self
                    .launcher
                    .run(component, command)
                    .map_err(|source| ProvisionError::ProcessLaunch { component, source })?;
                if !exited.success() {
                    return Err(ProvisionError::InstallerFailed {
                        component,
                        code: exited.code,
                    });
                }
            }
        }
        Ok(())
    }

    fn activate(&self, plan: &Plan) -> bool {
        if !plan.open_browser {
            info!(url = %plan.dashboard_url, "browser disabled, dashboard available");
            return false;
        }
        match self.browser.open(&plan.browser, &plan.dashboard_url) {
            Ok(()) => {
                info!(url = %plan.dashboard_url, "opened dashboard");
                true
            }
            Err(e) => {
                warn!(url = %plan.dashboard_url, error = %e, "failed to open browser");
                false
            }
        }
    }
}

fn top_level_entries(dir: &Path) -> Result<HashSet<OsString>> {
    let entries = fs::read_dir(dir).map_err(ProvisionError::io(dir))?;
    entries
        .map(|entry| entry.map(|e| e.file_name()).map_err(ProvisionError::io(dir)))
        .collect()
}

/// Journal every top-level entry of `dir` missing from `before`. A listing
/// failure is logged so it never hides the error that ended the stage.
fn record_new_entries(dir: &Path, before: &HashSet<OsString>, journal: &mut Journal) {
    match top_level_entries(dir) {
        Ok(after) => {
            for name in after.difference(before) {
                journal.remove_on_failure(dir.join(name));
            }
        }
        Err(e) => warn!(path = %dir.display(), error = %e, "cannot list install directory for rollback"),
    }
}

fn clean_staging(staging: &Path) {
    if !staging.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(staging) {
        warn!(path = %staging.display(), error = %e, "failed to remove staging directory");
    }
}

fn display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn display_opt<T: fmt::Display, S: serde::Serializer>(
    value: &Option<T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(platform: &str) -> ProvisionConfig {
        ProvisionConfig {
            platform: Some(platform.into()),
            install_dir: Some(PathBuf::from("/srv/logviewer")),
            source_dir: Some(PathBuf::from("/media/dist")),
            ..Default::default()
        }
    }

    #[test]
    fn plan_resolves_artifacts_against_source_dir() {
        let plan = Provisioner::new(config("macos")).plan().unwrap();

        assert_eq!(plan.platform, PlatformId::Macos);
        assert_eq!(plan.staging_dir, PathBuf::from("/srv/logviewer/.staging"));
        let order: Vec<_> = plan.components.iter().map(PlannedComponent::component).collect();
        assert_eq!(order, Component::ORDER.to_vec());
        assert_eq!(
            plan.components[1].source,
            Source::Local(PathBuf::from("/media/dist/elasticsearch-7.17.20-darwin-x86_64.tar.gz"))
        );
        assert_eq!(
            plan.components[2].install_path(&plan.install_dir),
            Some(PathBuf::from("/srv/logviewer/kibana-7.17.20-darwin-x86_64"))
        );
    }

    #[test]
    fn plan_applies_overrides() {
        let mut config = config("linux");
        config.search.source = Some("https://mirror.example/es.tar.gz".into());
        config.search.sha256 = Some("ab".repeat(32));
        config.dashboard.timeout_secs = Some(5);
        config.dashboard_url = Some("http://127.0.0.1:15601".into());

        let plan = Provisioner::new(config).plan().unwrap();
        let search = &plan.components[0];
        assert!(search.source.is_remote());
        assert_eq!(search.checksum, Some(Sha256Digest([0xab; 32])));

        let dashboard = plan.components[1].strategy.readiness.as_ref().unwrap();
        assert_eq!(dashboard.timeout, Duration::from_secs(5));
        assert_eq!(
            dashboard.target,
            ReadinessTarget::Http {
                url: "http://127.0.0.1:15601".into()
            }
        );
        assert_eq!(plan.dashboard_url, "http://127.0.0.1:15601");
    }

    #[test]
    fn bad_checksum_is_a_setting_error() {
        let mut config = config("linux");
        config.dashboard.sha256 = Some("not-hex".into());

        let err = Provisioner::new(config).plan().unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidSetting { ref key, .. } if key == "dashboard.sha256"));
    }

    #[test]
    fn unsupported_platform_fails_planning() {
        let err = Provisioner::new(config("plan9")).plan().unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedPlatform(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn new_entries_are_journaled() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "mine").unwrap();
        let before = top_level_entries(dir.path()).unwrap();
        fs::create_dir(dir.path().join("elasticsearch-7.17.20")).unwrap();

        let mut journal = Journal::new(true);
        record_new_entries(dir.path(), &before, &mut journal);
        assert_eq!(journal.unwind(), 0);

        assert!(!dir.path().join("elasticsearch-7.17.20").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn unlistable_install_dir_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        let mut journal = Journal::new(true);
        record_new_entries(&missing, &HashSet::new(), &mut journal);
        assert_eq!(journal.unwind(), 0);
        assert!(dir.path().exists());
    }

    #[test]
    fn plan_serializes() {
        let plan = Provisioner::new(config("windows")).plan().unwrap();
        let json = serde_json::to_value(&plan).unwrap();

        assert_eq!(json["platform"], "windows");
        assert_eq!(json["components"][0]["component"], "runtime");
        assert_eq!(json["components"][0]["install"]["kind"], "native-installer");
        assert_eq!(json["components"][1]["install"]["format"], "zip");
        assert!(json["components"][0]["checksum"].is_null());
    }
}
