//! Fragment fetching and mounting.
//!
//! The loader owns the mount point's contents. Each navigation fetches one
//! HTML fragment, extracts its content root, replaces whatever the previous
//! navigation mounted, and runs the enhancer pipeline over the result.
//!
//! ## Generations
//!
//! Every [`Loader::begin`] issues a new generation number. A fetch result
//! handed to [`Loader::complete`] is applied only while its generation is
//! still the latest; otherwise it is discarded as
//! [`LoadOutcome::Superseded`]. A slow response for an old navigation can
//! therefore never overwrite newer content.
//!
//! ## Failures
//!
//! Nothing propagates out of the loader. A non-2xx status, a transport error
//! or an unparseable body mounts an inline error naming the failed path:
//!
//! ```html
//! <div class="load-error" role="alert">
//!   <p>Content failed to load.</p>
//!   <pre>/books/new-testament/titus/001/titus-1-chapter-scripture.html: HTTP 404</pre>
//! </div>
//! ```
//!
//! Failed loads are never retried.

use crate::dom::{Document, NodeId};
use crate::enhance::{self, EnhancementContext, PipelineReport, bind};
use crate::prefs::ScripturePreference;
use crate::verses;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Fetching
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Always go to the source; never reuse a cached response.
    NoStore,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub path: String,
    pub cache: CacheMode,
}

impl FetchRequest {
    pub fn no_store(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cache: CacheMode::NoStore,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Source of fragments and data files, addressed by root-relative path.
pub trait Fetcher {
    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Serves paths from a site directory on disk. Missing files are 404s.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    site_root: PathBuf,
}

impl FsFetcher {
    pub fn new(site_root: impl Into<PathBuf>) -> Self {
        Self {
            site_root: site_root.into(),
        }
    }

    /// Map a root-relative URL path onto the site directory, refusing `..`.
    fn local_path(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| self.site_root.join(relative))
    }
}

impl Fetcher for FsFetcher {
    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let Some(local) = self.local_path(&request.path) else {
            return Ok(FetchResponse::not_found());
        };
        match std::fs::read_to_string(&local) {
            Ok(body) => Ok(FetchResponse::ok(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FetchResponse::not_found()),
            Err(source) => Err(FetchError::Io {
                path: local,
                source,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryRoutes {
    responses: HashMap<String, Result<FetchResponse, String>>,
    requests: Vec<FetchRequest>,
}

/// In-memory fetcher for embedding and tests. Unknown paths are 404s.
///
/// Clones share routes and the request log.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    routes: Rc<RefCell<MemoryRoutes>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, body: &str) {
        self.respond(path, FetchResponse::ok(body));
    }

    pub fn respond(&self, path: &str, response: FetchResponse) {
        self.routes
            .borrow_mut()
            .responses
            .insert(path.to_string(), Ok(response));
    }

    /// Make `path` fail at the transport level.
    pub fn fail(&self, path: &str, message: &str) {
        self.routes
            .borrow_mut()
            .responses
            .insert(path.to_string(), Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.routes.borrow().requests.clone()
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut routes = self.routes.borrow_mut();
        routes.requests.push(request.clone());
        match routes.responses.get(&request.path) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(FetchError::Network(message.clone())),
            None => Ok(FetchResponse::not_found()),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Id of the content root inside fetched fragments.
    pub fragment_root_id: String,
    /// Root-relative directory holding `{translation}/{book}.json` verse files.
    pub bibles_root: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            fragment_root_id: "doc-root".to_string(),
            bibles_root: "/assets/bibles-json".to_string(),
        }
    }
}

/// A started load, waiting for its fetch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLoad {
    pub generation: u64,
    pub document: String,
    pub path: String,
}

impl PendingLoad {
    pub fn request(&self) -> FetchRequest {
        FetchRequest::no_store(self.path.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStatus {
    Loaded,
    Failed(String),
    /// Hero state: the mount was emptied and nothing fetched.
    Cleared,
}

/// Emitted once per applied navigation, after enhancement and binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEvent {
    pub generation: u64,
    pub document: Option<String>,
    pub path: Option<String>,
    pub status: RenderStatus,
    pub report: PipelineReport,
    pub bound: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Rendered(RenderEvent),
    Superseded { generation: u64, latest: u64 },
}

type RenderListener = Box<dyn FnMut(&RenderEvent)>;

pub struct Loader {
    settings: LoaderSettings,
    generation: u64,
    context: Option<EnhancementContext>,
    listeners: Vec<RenderListener>,
}

impl Loader {
    pub fn new(settings: LoaderSettings) -> Self {
        Self {
            settings,
            generation: 0,
            context: None,
            listeners: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Context of the fragment currently mounted, if it loaded successfully.
    pub fn context(&self) -> Option<&EnhancementContext> {
        self.context.as_ref()
    }

    pub fn add_render_listener(&mut self, listener: impl FnMut(&RenderEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: &RenderEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Start loading `document` from `path`. Supersedes any load in flight.
    pub fn begin(&mut self, document: &str, path: &str) -> PendingLoad {
        let generation = self.next_generation();
        debug!(generation, path, "begin load");
        PendingLoad {
            generation,
            document: document.to_string(),
            path: path.to_string(),
        }
    }

    /// Apply a fetch result to the mount, unless a newer load has begun.
    ///
    /// `fetcher` serves the verse data that scripture roots in the fragment
    /// pull in; `preference` picks their translations and the column mode.
    pub fn complete(
        &mut self,
        doc: &mut Document,
        mount: NodeId,
        pending: PendingLoad,
        result: Result<FetchResponse, FetchError>,
        fetcher: &mut dyn Fetcher,
        preference: &ScripturePreference,
    ) -> LoadOutcome {
        if !self.is_current(pending.generation) {
            warn!(
                generation = pending.generation,
                latest = self.generation,
                path = %pending.path,
                "discarding superseded load"
            );
            return LoadOutcome::Superseded {
                generation: pending.generation,
                latest: self.generation,
            };
        }

        let fragment = result
            .map_err(|e| e.to_string())
            .and_then(|response| {
                if response.is_success() {
                    Ok(response.body)
                } else {
                    Err(format!("HTTP {}", response.status))
                }
            })
            .and_then(|body| Document::parse(&body).map_err(|e| e.to_string()));

        let event = match fragment {
            Ok(fragment) => {
                self.mount_fragment(doc, mount, &pending, &fragment, fetcher, preference)
            }
            Err(message) => self.mount_error(doc, mount, &pending, message),
        };
        self.emit(&event);
        LoadOutcome::Rendered(event)
    }

    /// [`begin`](Self::begin), fetch with `no-store`, then [`complete`](Self::complete).
    pub fn load(
        &mut self,
        doc: &mut Document,
        mount: NodeId,
        document: &str,
        path: &str,
        fetcher: &mut dyn Fetcher,
        preference: &ScripturePreference,
    ) -> LoadOutcome {
        let pending = self.begin(document, path);
        let result = fetcher.fetch(&pending.request());
        self.complete(doc, mount, pending, result, fetcher, preference)
    }

    /// Hero state: tear down and empty the mount without fetching.
    pub fn clear(&mut self, doc: &mut Document, mount: NodeId) -> RenderEvent {
        let generation = self.next_generation();
        enhance::teardown(doc, mount);
        doc.clear_children(mount);
        self.context = None;
        debug!(generation, "mount cleared");
        let event = RenderEvent {
            generation,
            document: None,
            path: None,
            status: RenderStatus::Cleared,
            report: PipelineReport::default(),
            bound: 0,
        };
        self.emit(&event);
        event
    }

    /// Re-bind interactive elements under the mount with the current context.
    pub fn rebind(&self, doc: &mut Document, mount: NodeId) -> usize {
        let ctx = self.context.clone().unwrap_or_default();
        bind::bind(doc, mount, &ctx)
    }

    /// Nodes to mount from a parsed fragment: children of the content root,
    /// else of `<body>`, else the whole parse.
    fn content_nodes(&self, fragment: &Document) -> Vec<NodeId> {
        let root = fragment
            .element_by_id(fragment.root(), &self.settings.fragment_root_id)
            .or_else(|| fragment.elements_by_tag(fragment.root(), "body").first().copied())
            .unwrap_or_else(|| fragment.root());
        fragment.children(root).to_vec()
    }

    fn mount_fragment(
        &mut self,
        doc: &mut Document,
        mount: NodeId,
        pending: &PendingLoad,
        fragment: &Document,
        fetcher: &mut dyn Fetcher,
        preference: &ScripturePreference,
    ) -> RenderEvent {
        enhance::teardown(doc, mount);
        doc.clear_children(mount);
        for node in self.content_nodes(fragment) {
            let copy = doc.import(fragment, node);
            doc.append_child(mount, copy);
        }

        let ctx = EnhancementContext::for_fetch(&pending.document, &pending.path);
        verses::hydrate(doc, mount, fetcher, &self.settings.bibles_root, preference);
        let report = enhance::run_pipeline(doc, mount, &ctx, preference.mode);
        let bound = bind::bind(doc, mount, &ctx);
        self.context = Some(ctx);
        debug!(generation = pending.generation, path = %pending.path, "fragment mounted");

        RenderEvent {
            generation: pending.generation,
            document: Some(pending.document.clone()),
            path: Some(pending.path.clone()),
            status: RenderStatus::Loaded,
            report,
            bound,
        }
    }

    fn mount_error(
        &mut self,
        doc: &mut Document,
        mount: NodeId,
        pending: &PendingLoad,
        message: String,
    ) -> RenderEvent {
        warn!(path = %pending.path, error = %message, "fragment failed to load");
        enhance::teardown(doc, mount);
        doc.clear_children(mount);
        let markup = error_fragment(&pending.path, &message);
        if let Err(e) = doc.append_html(mount, &markup) {
            warn!("could not mount error fragment: {e}");
            let text =
                doc.create_text(&format!("Content failed to load. {}: {message}", pending.path));
            doc.append_child(mount, text);
        }
        self.context = None;
        RenderEvent {
            generation: pending.generation,
            document: Some(pending.document.clone()),
            path: Some(pending.path.clone()),
            status: RenderStatus::Failed(message),
            report: PipelineReport::default(),
            bound: 0,
        }
    }
}

/// Inline error shown in place of a fragment.
pub fn error_fragment(path: &str, message: &str) -> String {
    maud::html! {
        div.load-error role="alert" {
            p { "Content failed to load." }
            pre { (path) ": " (message) }
        }
    }
    .into_string()
}
