// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The build orchestrator.
//!
//! `Compiler` owns all per-instance state — file registry, cache store,
//! transform pipeline, output registry, plugin loader — behind one
//! shared handle; there are no process-wide globals. The lifecycle is
//! `NotSetup → SettingUp → Ready`, with at most one compile in flight at
//! a time. A compile transforms the known file set, applies the batch to
//! the registry run-to-completion, then fans output generation out over
//! an immutable snapshot and commits the artifacts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};

use crate::cache::CacheStore;
use crate::config::{Options, DEFAULT_BUILD_DIR};
use crate::error::{Error, Result};
use crate::events::{ChangeKind, ChangedFile, CompileSummary, CompilerEvent, EventHub};
use crate::file::{File, FileType, Target};
use crate::ignorefile::IgnoreMatcher;
use crate::manifest::Manifest;
use crate::output::{default_outputs, Artifact, OutputContext, OutputGenerator};
use crate::plugin::{Plugin, PluginLoader};
use crate::scan;
use crate::transform::TransformPipeline;
use crate::watcher::{Change, FileWatcher};

/// Lifecycle state of a compiler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerState {
    /// `setup()` has not run (or was reset by a failure or `clear()`).
    NotSetup,
    /// `setup()` is in flight.
    SettingUp,
    /// Ready to compile.
    Ready,
}

/// Per-compile options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Skip the cache fast path and re-transform every file.
    pub force: bool,
}

/// Destination for committed artifacts.
///
/// The default sink writes into the build directory; `pack()` supplies a
/// tar sink instead.
pub trait ArtifactSink: Send {
    /// Persists one artifact.
    fn write(&mut self, artifact: &Artifact) -> Result<()>;
}

struct TransformOutcome {
    file: File,
    changed: bool,
}

struct Inner {
    root: PathBuf,
    options: Options,
    state: Mutex<CompilerState>,
    setup_lock: AsyncMutex<()>,
    compile_lock: AsyncMutex<()>,
    compiling: AtomicBool,
    built_once: AtomicBool,
    seq: AtomicU64,
    files: RwLock<HashMap<String, File>>,
    modules: RwLock<Vec<File>>,
    matcher: RwLock<IgnoreMatcher>,
    cache: RwLock<Option<Arc<CacheStore>>>,
    transforms: RwLock<TransformPipeline>,
    outputs: RwLock<Vec<Arc<dyn OutputGenerator>>>,
    plugins: Mutex<PluginLoader>,
    manifest: RwLock<Manifest>,
    events: EventHub,
}

/// The incremental build pipeline.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Compiler {
    inner: Arc<Inner>,
}

impl Compiler {
    /// Creates a compiler for the project at `dir`.
    ///
    /// `presto.toml` (if present) fills in options the caller left at
    /// their defaults. Default transforms and outputs are registered;
    /// plugins may add more before `setup()`.
    pub fn new(dir: impl AsRef<Path>, options: Options) -> Result<Self> {
        let root = resolve_root(dir.as_ref())?;
        let options = options.merge_config(&root)?;

        let mut matcher = IgnoreMatcher::with_defaults(&root, &options.ignore)?;
        if options.build_dir != DEFAULT_BUILD_DIR {
            matcher.add_pattern(&options.build_dir)?;
        }

        Ok(Self {
            inner: Arc::new(Inner {
                root,
                options,
                state: Mutex::new(CompilerState::NotSetup),
                setup_lock: AsyncMutex::new(()),
                compile_lock: AsyncMutex::new(()),
                compiling: AtomicBool::new(false),
                built_once: AtomicBool::new(false),
                seq: AtomicU64::new(0),
                files: RwLock::new(HashMap::new()),
                modules: RwLock::new(Vec::new()),
                matcher: RwLock::new(matcher),
                cache: RwLock::new(None),
                transforms: RwLock::new(TransformPipeline::with_defaults()),
                outputs: RwLock::new(default_outputs()),
                plugins: Mutex::new(PluginLoader::new()),
                manifest: RwLock::new(Manifest::default()),
                events: EventHub::new(),
            }),
        })
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// The resolved build directory.
    pub fn build_dir(&self) -> PathBuf {
        self.inner.root.join(&self.inner.options.build_dir)
    }

    /// Whether this compiler builds in production mode.
    pub fn production(&self) -> bool {
        self.inner.options.production
    }

    /// The effective options.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CompilerState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    /// Whether `setup()` has completed.
    pub fn has_setup(&self) -> bool {
        self.state() == CompilerState::Ready
    }

    /// Whether a compile is currently in flight.
    pub fn is_compiling(&self) -> bool {
        self.inner.compiling.load(Ordering::SeqCst)
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<CompilerEvent> {
        self.inner.events.subscribe()
    }

    /// Appends a transform stage. Append-only once setup has run.
    pub fn transform<F>(&self, stage: F)
    where
        F: Fn(&mut File, &str) -> Result<Option<String>> + Send + Sync + 'static,
    {
        self.inner
            .transforms
            .write()
            .expect("transforms lock poisoned")
            .push(stage);
    }

    /// Appends an output generator. Append-only once setup has run.
    pub fn output(&self, generator: Arc<dyn OutputGenerator>) {
        self.inner
            .outputs
            .write()
            .expect("outputs lock poisoned")
            .push(generator);
    }

    /// Registers a plugin extension under a dependency name.
    ///
    /// Must happen before `setup()`; the manifest decides whether and
    /// when the extension is invoked.
    pub fn register_plugin(&self, name: impl Into<String>, plugin: Arc<dyn Plugin>) {
        self.inner
            .plugins
            .lock()
            .expect("plugins lock poisoned")
            .add(name, plugin);
    }

    /// Names of plugins that loaded during setup, in load order.
    pub fn loaded_plugins(&self) -> Vec<String> {
        self.inner
            .plugins
            .lock()
            .expect("plugins lock poisoned")
            .loaded()
            .to_vec()
    }

    /// Adds an extra file to the pipeline, outside of scanning.
    pub fn include(&self, path: &str) {
        let mut files = self.inner.files.write().expect("files lock poisoned");
        files
            .entry(path.to_string())
            .or_insert_with(|| File::new(path));
    }

    /// Injects (or reclassifies) a virtual module under the given id.
    pub fn require(&self, id: &str, file_type: FileType, targets: Vec<Target>) {
        let mut modules = self.inner.modules.write().expect("modules lock poisoned");
        if let Some(module) = modules.iter_mut().find(|m| m.path() == id) {
            module.set_type(file_type);
            module.set_targets(targets);
        } else {
            modules.push(File::module(id, file_type, targets));
        }
    }

    /// Snapshot of the registry in scan order.
    pub fn files(&self) -> Vec<File> {
        let files = self.inner.files.read().expect("files lock poisoned");
        let mut snapshot: Vec<File> = files.values().cloned().collect();
        snapshot.sort_by(|a, b| scan::compare_paths(a.path(), b.path()));
        snapshot
    }

    /// Looks up one registry entry.
    pub fn file(&self, path: &str) -> Option<File> {
        self.inner
            .files
            .read()
            .expect("files lock poisoned")
            .get(path)
            .cloned()
    }

    /// Prepares the compiler: verifies the project directory, creates
    /// the build directory, opens the cache store and loads plugins.
    ///
    /// Idempotent; concurrent callers serialize on the setup lock and
    /// observe the completed setup. A failure resets to `NotSetup` and
    /// the call may simply be retried.
    pub async fn setup(&self) -> Result<()> {
        let _guard = self.inner.setup_lock.lock().await;
        if self.has_setup() {
            return Ok(());
        }

        self.set_state(CompilerState::SettingUp);
        match self.do_setup().await {
            Ok(()) => {
                self.set_state(CompilerState::Ready);
                self.inner.events.emit(CompilerEvent::Setup);
                Ok(())
            }
            Err(e) => {
                self.set_state(CompilerState::NotSetup);
                Err(e)
            }
        }
    }

    async fn do_setup(&self) -> Result<()> {
        let root = self.inner.root.clone();
        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(Error::NotAProject(root)),
        }

        let build_dir = self.build_dir();
        tokio::fs::create_dir_all(&build_dir).await?;

        let store = CacheStore::open(&build_dir.join("cache.db"))?;
        *self.inner.cache.write().expect("cache lock poisoned") = Some(Arc::new(store));

        let manifest = Manifest::load(&root)?;
        *self.inner.manifest.write().expect("manifest lock poisoned") = manifest.clone();

        // plugins run against the live compiler, so the loader leaves
        // its mutex for the duration
        let mut loader = std::mem::take(
            &mut *self.inner.plugins.lock().expect("plugins lock poisoned"),
        );
        let result = loader.load_all(self, &manifest, &root);
        *self.inner.plugins.lock().expect("plugins lock poisoned") = loader;
        result
    }

    /// Lists all non-ignored files under the project root, in scan order.
    pub async fn scan(&self) -> Result<Vec<String>> {
        let root = self.inner.root.clone();
        let matcher = self
            .inner
            .matcher
            .read()
            .expect("matcher lock poisoned")
            .clone();
        tokio::task::spawn_blocking(move || scan::scan(&root, &matcher))
            .await
            .map_err(|e| Error::Scan(e.to_string()))?
    }

    /// Compiles the known file set and commits artifacts to the build
    /// directory.
    pub async fn compile(&self, options: CompileOptions) -> Result<CompileSummary> {
        self.compile_with(options, None).await
    }

    /// Compiles the known file set, committing artifacts through `sink`
    /// (or the build directory when `None`).
    ///
    /// Single-flight: a concurrent call waits for the in-flight compile
    /// to finish before starting. Failures emit an [`CompilerEvent::Error`]
    /// and leave previous artifacts and the `Ready` state untouched.
    pub async fn compile_with(
        &self,
        options: CompileOptions,
        sink: Option<&mut dyn ArtifactSink>,
    ) -> Result<CompileSummary> {
        if !self.has_setup() {
            return Err(Error::NotSetup);
        }

        let _guard = self.inner.compile_lock.lock().await;
        self.inner.compiling.store(true, Ordering::SeqCst);
        let _flag = CompilingFlag(&self.inner.compiling);

        match self.do_compile(options, sink).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.inner.events.emit(CompilerEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn do_compile(
        &self,
        options: CompileOptions,
        sink: Option<&mut dyn ArtifactSink>,
    ) -> Result<CompileSummary> {
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.events.emit(CompilerEvent::PreTransform);

        let cache = self.cache()?;
        let pipeline = self
            .inner
            .transforms
            .read()
            .expect("transforms lock poisoned")
            .clone();
        let concurrency = self.inner.options.concurrency.max(1);

        let mut snapshot: Vec<File> = {
            let files = self.inner.files.read().expect("files lock poisoned");
            files.values().cloned().collect()
        };
        snapshot.sort_by(|a, b| scan::compare_paths(a.path(), b.path()));

        let results: Vec<Result<TransformOutcome>> = stream::iter(snapshot)
            .map(|file| self.transform_file(&pipeline, &cache, file, options.force))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // apply the whole batch before anything downstream sees it
        let mut changed: Vec<ChangedFile> = Vec::new();
        let mut removed: Vec<String> = Vec::new();
        {
            let mut files = self.inner.files.write().expect("files lock poisoned");
            for result in results {
                match result {
                    Ok(outcome) => {
                        let path = outcome.file.path().to_string();
                        if outcome.file.removed() {
                            files.remove(&path);
                            removed.push(path);
                        } else {
                            if outcome.changed {
                                changed.push(ChangedFile {
                                    path: path.clone(),
                                    targets: outcome.file.targets().to_vec(),
                                });
                            }
                            files.insert(path, outcome.file);
                        }
                    }
                    Err(e) => {
                        // one file's failure never aborts the batch
                        tracing::warn!(error = %e, "transform failed, keeping previous state");
                        self.inner.events.emit(CompilerEvent::Error {
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        changed.sort_by(|a, b| scan::compare_paths(&a.path, &b.path));
        removed.sort();

        self.inner.events.emit(CompilerEvent::PostTransform {
            changed: changed.iter().map(|c| c.path.clone()).collect(),
        });

        if !removed.is_empty() {
            let generators = self
                .inner
                .outputs
                .read()
                .expect("outputs lock poisoned")
                .clone();
            for generator in &generators {
                generator.invalidate(&removed);
            }
            self.inner.events.emit(CompilerEvent::Removed {
                paths: removed.clone(),
            });
        }

        self.inner.events.emit(CompilerEvent::PreOutput);
        let artifacts = self.generate_outputs().await?;
        let written = self.commit(&artifacts, sink).await?;
        self.inner
            .events
            .emit(CompilerEvent::PostOutput { paths: written });

        let summary = CompileSummary {
            seq,
            full: options.force,
            changed,
        };
        self.inner.events.emit(CompilerEvent::Compile {
            summary: summary.clone(),
        });
        self.inner.built_once.store(true, Ordering::SeqCst);
        Ok(summary)
    }

    async fn transform_file(
        &self,
        pipeline: &TransformPipeline,
        cache: &CacheStore,
        mut file: File,
        force: bool,
    ) -> Result<TransformOutcome> {
        if file.is_module() {
            return Ok(TransformOutcome {
                file,
                changed: false,
            });
        }

        let path = file.path().to_string();
        let full = file.fullpath(&self.inner.root);

        let meta = match tokio::fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                file.set_removed(true);
                cache.remove(&path)?;
                tracing::debug!(path = %path, "stat miss, tombstoning");
                return Ok(TransformOutcome {
                    file,
                    changed: false,
                });
            }
            Err(e) => {
                return Err(Error::Transform {
                    path,
                    message: e.to_string(),
                })
            }
        };
        let mtime = mtime_millis(&meta);

        if !force {
            if let Some(rec) = cache.get(&path)? {
                if mtime <= rec.timestamp {
                    file.set_type(rec.file_type);
                    file.set_targets(rec.targets.clone());
                    file.set_content(rec.content);
                    file.set_timestamp(rec.timestamp);
                    file.set_revision(rec.revision);
                    file.set_removed(false);
                    tracing::debug!(path = %path, "cache hit, skipping transform");
                    return Ok(TransformOutcome {
                        file,
                        changed: false,
                    });
                }
            }
        }

        let source = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| Error::Transform {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let output = pipeline.run(&mut file, source)?;

        if file.removed() {
            cache.remove(&path)?;
            return Ok(TransformOutcome {
                file,
                changed: false,
            });
        }

        // fetch the current revision immediately before the CAS write
        let expected = cache.revision(&path)?;
        let revision = cache.put(
            &path,
            file.file_type(),
            file.targets(),
            &output,
            mtime,
            expected,
        )?;
        file.set_content(output);
        file.set_timestamp(mtime);
        file.set_revision(revision);
        file.set_removed(false);
        Ok(TransformOutcome {
            file,
            changed: true,
        })
    }

    async fn generate_outputs(&self) -> Result<Vec<Artifact>> {
        let ctx = Arc::new(OutputContext {
            files: self.files(),
            modules: self
                .inner
                .modules
                .read()
                .expect("modules lock poisoned")
                .clone(),
            manifest: self
                .inner
                .manifest
                .read()
                .expect("manifest lock poisoned")
                .clone(),
            production: self.production(),
        });

        let generators = self
            .inner
            .outputs
            .read()
            .expect("outputs lock poisoned")
            .clone();

        let mut handles = Vec::with_capacity(generators.len());
        for generator in generators {
            let ctx = Arc::clone(&ctx);
            handles.push(tokio::task::spawn_blocking(move || {
                let name = generator.name().to_string();
                (name, generator.generate(&ctx))
            }));
        }

        let mut artifacts = Vec::new();
        for handle in handles {
            let (name, result) = handle.await.map_err(|e| Error::Output {
                name: "output".to_string(),
                message: e.to_string(),
            })?;
            match result {
                Ok(mut batch) => artifacts.append(&mut batch),
                Err(e) => {
                    return Err(Error::Output {
                        name,
                        message: e.to_string(),
                    })
                }
            }
        }
        Ok(artifacts)
    }

    async fn commit(
        &self,
        artifacts: &[Artifact],
        sink: Option<&mut dyn ArtifactSink>,
    ) -> Result<Vec<String>> {
        let mut written = Vec::with_capacity(artifacts.len());
        match sink {
            Some(sink) => {
                for artifact in artifacts {
                    sink.write(artifact)?;
                    written.push(artifact.path.clone());
                }
            }
            None => {
                let build_dir = self.build_dir();
                for artifact in artifacts {
                    let full = build_dir.join(&artifact.path);
                    if let Some(parent) = full.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&full, &artifact.content).await?;
                    written.push(artifact.path.clone());
                }
            }
        }
        Ok(written)
    }

    /// Full build: fresh scan, then a forced compile.
    pub async fn flush(&self) -> Result<CompileSummary> {
        self.flush_with(None).await
    }

    /// Full build committing through `sink`.
    pub async fn flush_with(
        &self,
        sink: Option<&mut dyn ArtifactSink>,
    ) -> Result<CompileSummary> {
        self.setup().await?;
        let paths = self.scan().await?;
        {
            let mut files = self.inner.files.write().expect("files lock poisoned");
            for path in paths {
                files.entry(path.clone()).or_insert_with(|| File::new(&path));
            }
        }
        self.compile_with(CompileOptions { force: true }, sink).await
    }

    /// Watches the project and recompiles on changes.
    ///
    /// Runs an initial full build, then coalesces filesystem events per
    /// debounce window into one incremental compile each — or a full
    /// build while no successful build exists yet. Changes arriving
    /// mid-compile queue exactly one follow-up compile.
    pub async fn watch(&self) -> Result<WatchHandle> {
        self.setup().await?;

        let root = self.inner.root.clone();
        let matcher = self
            .inner
            .matcher
            .read()
            .expect("matcher lock poisoned")
            .clone();
        let filter_root = root.clone();
        let (watcher, rx) = FileWatcher::new(
            &root,
            Duration::from_millis(self.inner.options.debounce_ms),
            move |rel| scan::is_watchable(&filter_root, &matcher, rel),
        )?;

        // initial full build; a failure emits its error event and the
        // next change retries with a flush
        let _ = self.flush().await;

        let compiler = self.clone();
        let task = tokio::spawn(async move {
            // owns the watcher for the lifetime of the loop
            let _watcher = watcher;
            let mut rx = rx;
            while let Some(first) = rx.recv().await {
                let changes = drain_pending(&mut rx, first);
                let _ = compiler.process_changes(changes).await;
            }
        });

        Ok(WatchHandle { task })
    }

    /// Applies one coalesced batch of watch events: registers new
    /// paths, emits change events and runs exactly one compile.
    pub(crate) async fn process_changes(&self, changes: Vec<Change>) -> Result<CompileSummary> {
        {
            let mut files = self.inner.files.write().expect("files lock poisoned");
            for change in &changes {
                if matches!(change.kind, ChangeKind::Add | ChangeKind::Modify) {
                    files
                        .entry(change.path.clone())
                        .or_insert_with(|| File::new(&change.path));
                }
            }
        }
        for change in &changes {
            self.inner.events.emit(CompilerEvent::Change {
                kind: change.kind,
                path: change.path.clone(),
            });
        }

        if self.inner.built_once.load(Ordering::SeqCst) {
            self.compile(CompileOptions::default()).await
        } else {
            self.flush().await
        }
    }

    /// Production build packed into a gzipped tarball.
    ///
    /// Artifacts stream into `package/<path>` entries; the archive is
    /// named after the slugged manifest name and version and written to
    /// `dest` (or the project root).
    pub async fn pack(&self, dest: Option<&Path>) -> Result<PathBuf> {
        if !self.production() {
            return Err(Error::Config(
                "pack requires a production-mode compiler".to_string(),
            ));
        }
        self.setup().await?;

        let manifest = self
            .inner
            .manifest
            .read()
            .expect("manifest lock poisoned")
            .clone();
        let mut stem = manifest
            .name
            .clone()
            .unwrap_or_else(|| "presto-application".to_string());
        if let Some(version) = &manifest.version {
            stem.push(' ');
            stem.push_str(version);
        }
        let tarpath = dest
            .unwrap_or(&self.inner.root)
            .join(format!("{}.tar.gz", slug(&stem)));

        let out = std::fs::File::create(&tarpath)?;
        let mut sink = TarSink::new(out);
        self.flush_with(Some(&mut sink)).await?;
        sink.finish()?;
        Ok(tarpath)
    }

    /// Empties the build directory and resets to `NotSetup`.
    pub async fn clear(&self) -> Result<()> {
        let build_dir = self.build_dir();
        match tokio::fs::read_dir(&build_dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if entry.file_type().await?.is_dir() {
                        tokio::fs::remove_dir_all(&path).await?;
                    } else {
                        tokio::fs::remove_file(&path).await?;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.reset();
        Ok(())
    }

    /// Removes the build directory entirely and resets to `NotSetup`.
    pub async fn destroy(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(self.build_dir()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.reset();
        Ok(())
    }

    fn reset(&self) {
        *self.inner.cache.write().expect("cache lock poisoned") = None;
        self.inner.built_once.store(false, Ordering::SeqCst);
        self.set_state(CompilerState::NotSetup);
    }

    fn cache(&self) -> Result<Arc<CacheStore>> {
        self.inner
            .cache
            .read()
            .expect("cache lock poisoned")
            .clone()
            .ok_or(Error::NotSetup)
    }

    fn set_state(&self, state: CompilerState) {
        *self.inner.state.lock().expect("state lock poisoned") = state;
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("root", &self.inner.root)
            .field("state", &self.state())
            .finish()
    }
}

/// Handle over a running watch; dropping it does not stop the watch,
/// call [`WatchHandle::stop`].
pub struct WatchHandle {
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stops watching.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Waits until the watch loop exits.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

struct CompilingFlag<'a>(&'a AtomicBool);

impl Drop for CompilingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Merges every already-queued batch into one deduplicated change list.
pub(crate) fn drain_pending(
    rx: &mut mpsc::UnboundedReceiver<Vec<Change>>,
    first: Vec<Change>,
) -> Vec<Change> {
    let mut all = first;
    while let Ok(more) = rx.try_recv() {
        all.extend(more);
    }

    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::with_capacity(all.len());
    // keep the last event per path; a create followed by an unlink must
    // not resurrect the file
    for change in all.into_iter().rev() {
        if seen.insert(change.path.clone()) {
            deduped.push(change);
        }
    }
    deduped.reverse();
    deduped
}

struct TarSink {
    builder: tar::Builder<GzEncoder<std::fs::File>>,
}

impl TarSink {
    fn new(file: std::fs::File) -> Self {
        Self {
            builder: tar::Builder::new(GzEncoder::new(file, Compression::default())),
        }
    }

    fn finish(self) -> Result<()> {
        let encoder = self.builder.into_inner()?;
        encoder.finish()?;
        Ok(())
    }
}

impl ArtifactSink for TarSink {
    fn write(&mut self, artifact: &Artifact) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_size(artifact.content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder.append_data(
            &mut header,
            format!("package/{}", artifact.path),
            artifact.content.as_slice(),
        )?;
        Ok(())
    }
}

fn resolve_root(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

fn mtime_millis(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CompilerEvent;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn compiler(root: &Path) -> Compiler {
        Compiler::new(root, Options::default()).unwrap()
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("My App 1.2.0"), "my-app-1-2-0");
        assert_eq!(slug("app"), "app");
        assert_eq!(slug("--weird--"), "weird");
    }

    #[test]
    fn test_drain_pending_dedups_keeping_last() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(vec![Change {
            kind: ChangeKind::Add,
            path: "a.js".to_string(),
        }])
        .unwrap();
        tx.send(vec![Change {
            kind: ChangeKind::Remove,
            path: "a.js".to_string(),
        }])
        .unwrap();

        let first = vec![Change {
            kind: ChangeKind::Modify,
            path: "b.js".to_string(),
        }];
        let drained = drain_pending(&mut rx, first);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].path, "b.js");
        assert_eq!(drained[1].path, "a.js");
        assert_eq!(drained[1].kind, ChangeKind::Remove);
    }

    #[tokio::test]
    async fn test_setup_on_missing_dir_is_not_a_project() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let c = compiler(&missing);
        let err = c.setup().await.unwrap_err();
        assert!(matches!(err, Error::NotAProject(_)));
        assert_eq!(c.state(), CompilerState::NotSetup);
    }

    #[tokio::test]
    async fn test_setup_is_idempotent_and_concurrent_safe() {
        let dir = TempDir::new().unwrap();
        let c = compiler(dir.path());

        let (a, b) = tokio::join!(c.setup(), c.setup());
        a.unwrap();
        b.unwrap();
        assert!(c.has_setup());
        assert!(c.build_dir().is_dir());

        c.setup().await.unwrap();
        assert!(c.has_setup());
    }

    #[tokio::test]
    async fn test_compile_before_setup_is_rejected() {
        let dir = TempDir::new().unwrap();
        let c = compiler(dir.path());
        let err = c.compile(CompileOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotSetup));
    }

    #[tokio::test]
    async fn test_flush_builds_artifacts_in_scan_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "lib/a.js", "var a = 1;");
        write(root, "main.js", "var m = require('./lib/a');");
        write(root, "b/c.js", "var c = 3;");

        let c = compiler(root);
        let summary = c.flush().await.unwrap();
        assert!(summary.full);
        assert_eq!(summary.seq, 1);

        let bundle = std::fs::read_to_string(c.build_dir().join("client.js")).unwrap();
        let a = bundle.find("\"lib/a.js\"").unwrap();
        let b = bundle.find("\"b/c.js\"").unwrap();
        let m = bundle.find("\"main.js\"").unwrap();
        assert!(a < b && b < m);

        let entry = std::fs::read_to_string(c.build_dir().join("server.js")).unwrap();
        assert!(entry.contains("require(\"../lib/a.js\")"));
        assert!(std::fs::read_to_string(c.build_dir().join(".gitignore"))
            .unwrap()
            .contains("!.gitignore"));
    }

    #[tokio::test]
    async fn test_incremental_compile_reuses_cache() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "main.js", "var m = 1;");

        let c = compiler(root);
        c.flush().await.unwrap();

        // nothing changed on disk, so the incremental compile reports
        // no changed files
        let summary = c.compile(CompileOptions::default()).await.unwrap();
        assert!(!summary.full);
        assert!(summary.changed.is_empty());
    }

    #[tokio::test]
    async fn test_transform_error_is_isolated() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "good.js", "var g = 1;");
        write(root, "bad.weird", "boom");

        let c = compiler(root);
        c.transform(|file, _src| {
            if file.path().ends_with(".weird") {
                Err(Error::Config("no idea what this is".to_string()))
            } else {
                Ok(None)
            }
        });

        // the batch still completes and the good file is compiled
        let summary = c.flush().await.unwrap();
        assert!(summary.changed.iter().any(|f| f.path == "good.js"));
        assert!(!summary.changed.iter().any(|f| f.path == "bad.weird"));
    }

    #[tokio::test]
    async fn test_process_changes_coalesces_to_one_compile() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "main.js", "var m = 1;");

        let c = compiler(root);
        c.flush().await.unwrap();
        let mut rx = c.subscribe();

        // two edits to the same path inside one debounce window
        tokio::time::sleep(Duration::from_millis(20)).await;
        write(root, "main.js", "var m = 2;");
        let summary = c
            .process_changes(vec![
                Change {
                    kind: ChangeKind::Modify,
                    path: "main.js".to_string(),
                },
                Change {
                    kind: ChangeKind::Modify,
                    path: "main.js".to_string(),
                },
            ])
            .await
            .unwrap();

        let occurrences = summary
            .changed
            .iter()
            .filter(|f| f.path == "main.js")
            .count();
        assert_eq!(occurrences, 1);

        // exactly one compile event was emitted for the batch
        let mut compiles = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, CompilerEvent::Compile { .. }) {
                compiles += 1;
            }
        }
        assert_eq!(compiles, 1);
    }

    #[tokio::test]
    async fn test_removed_file_is_tombstoned_and_evicted() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "gone.js", "var g = 1;");

        let c = compiler(root);
        c.flush().await.unwrap();
        assert!(c.file("gone.js").is_some());

        std::fs::remove_file(root.join("gone.js")).unwrap();
        let mut rx = c.subscribe();
        c.compile(CompileOptions::default()).await.unwrap();
        assert!(c.file("gone.js").is_none());

        let mut saw_removed = false;
        while let Ok(event) = rx.try_recv() {
            if let CompilerEvent::Removed { paths } = event {
                assert_eq!(paths, vec!["gone.js".to_string()]);
                saw_removed = true;
            }
        }
        assert!(saw_removed);
    }

    #[tokio::test]
    async fn test_virtual_modules_reach_outputs() {
        let dir = TempDir::new().unwrap();
        let c = compiler(dir.path());
        c.require(
            "presto-runtime/client",
            FileType::Script,
            vec![Target::Client],
        );
        c.flush().await.unwrap();

        let bundle = std::fs::read_to_string(c.build_dir().join("client.js")).unwrap();
        assert!(bundle.contains("presto-runtime/client"));
    }

    #[tokio::test]
    async fn test_clear_resets_state() {
        let dir = TempDir::new().unwrap();
        let c = compiler(dir.path());
        c.flush().await.unwrap();
        assert!(c.has_setup());

        c.clear().await.unwrap();
        assert!(!c.has_setup());
        assert!(c.build_dir().is_dir());
        assert!(!c.build_dir().join("client.js").exists());
    }
}
