//! The floating prompt panel and its open/close state machine
//!
//! One panel per document. Its host node and shadow root are created on the
//! first open and reused afterwards; only the mounted app comes and goes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement, ShadowRoot, ShadowRootInit, ShadowRootMode};

use crate::config::ContentConfig;
use crate::dom;
use crate::error::{describe_js, ContentError, Result};

/// Page-global through which the extension supplies its panel UI:
/// `{ mount(container, onClose) -> handle }`, where `handle.unmount()` is
/// optional.
pub const PANEL_FACTORY_GLOBAL: &str = "__promptdockPanel";

const PANEL_CSS: &str = "
:host { all: initial; }
.promptdock-panel {
  position: fixed; top: 16px; right: 16px; width: 360px; max-height: 70vh;
  overflow: auto; background: #1e1e1e; color: #d4d4d4; border-radius: 8px;
  box-shadow: 0 8px 24px rgba(0, 0, 0, 0.4);
  font: 13px/1.4 system-ui, sans-serif; z-index: 2147483647;
}
.promptdock-header { display: flex; justify-content: space-between; padding: 8px 12px; }
.promptdock-close { background: none; border: 0; color: inherit; cursor: pointer; }
";

/// Seam between the state machine and the environment that renders it
pub trait PanelSurface {
    /// Isolation boundary: created once, reused across opens
    type Boundary;
    /// A mounted UI instance
    type App;

    fn create_boundary(&mut self) -> Result<Self::Boundary>;
    fn mount(&mut self, boundary: &Self::Boundary) -> Result<Self::App>;
    fn unmount(&mut self, boundary: &Self::Boundary, app: Self::App) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    Closed,
    Open,
}

pub struct PanelController<S: PanelSurface> {
    surface: S,
    boundary: Option<S::Boundary>,
    app: Option<S::App>,
}

impl<S: PanelSurface> PanelController<S> {
    pub const fn new(surface: S) -> Self {
        Self {
            surface,
            boundary: None,
            app: None,
        }
    }

    pub const fn phase(&self) -> PanelPhase {
        if self.app.is_some() {
            PanelPhase::Open
        } else {
            PanelPhase::Closed
        }
    }

    pub const fn boundary(&self) -> Option<&S::Boundary> {
        self.boundary.as_ref()
    }

    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Mount the panel. Returns `Ok(false)` if it was already open.
    pub fn open(&mut self) -> Result<bool> {
        if self.app.is_some() {
            return Ok(false);
        }
        let boundary = match self.boundary.take() {
            Some(boundary) => boundary,
            None => self.surface.create_boundary()?,
        };
        let mounted = self.surface.mount(&boundary);
        self.boundary = Some(boundary);
        self.app = Some(mounted?);
        Ok(true)
    }

    /// Unmount the panel. Returns `false` if it was already closed.
    ///
    /// An unmount failure is logged and the panel still ends up closed.
    pub fn close(&mut self) -> bool {
        let Some(app) = self.app.take() else {
            return false;
        };
        if let Some(boundary) = &self.boundary {
            if let Err(err) = self.surface.unmount(boundary, app) {
                warn!(%err, "panel unmount failed");
            }
        }
        true
    }
}

/// Host node plus its open shadow root
pub struct DomBoundary {
    pub host: HtmlElement,
    pub root: ShadowRoot,
}

pub struct MountedApp {
    container: Element,
    handle: JsValue,
    /// Cleared on unmount; the `onClose` given to this mount checks it
    live: Rc<Cell<bool>>,
}

/// Renders the panel into a shadow root attached to `<html>`
pub struct DomSurface {
    host_id: String,
}

impl DomSurface {
    pub fn new(host_id: &str) -> Self {
        Self {
            host_id: host_id.to_string(),
        }
    }
}

impl PanelSurface for DomSurface {
    type Boundary = DomBoundary;
    type App = MountedApp;

    fn create_boundary(&mut self) -> Result<DomBoundary> {
        let doc = dom::document()?;
        let host: HtmlElement = doc
            .create_element("div")?
            .dyn_into()
            .map_err(|_| ContentError::Dom("panel host is not an HTML element".into()))?;
        host.set_id(&self.host_id);

        let root = host.attach_shadow(&ShadowRootInit::new(ShadowRootMode::Open))?;
        let style = doc.create_element("style")?;
        style.set_text_content(Some(PANEL_CSS));
        root.append_child(&style)?;

        doc.document_element()
            .ok_or(ContentError::MissingGlobal("documentElement"))?
            .append_child(&host)?;
        debug!(id = %self.host_id, "panel host created");
        Ok(DomBoundary { host, root })
    }

    fn mount(&mut self, boundary: &DomBoundary) -> Result<MountedApp> {
        let doc = dom::document()?;
        // Pages that rebuild their DOM can drop our host; put it back.
        if !boundary.host.is_connected() {
            doc.document_element()
                .ok_or(ContentError::MissingGlobal("documentElement"))?
                .append_child(&boundary.host)?;
        }

        let container = doc.create_element("div")?;
        container.set_class_name("promptdock-panel");
        boundary.root.append_child(&container)?;

        let live = Rc::new(Cell::new(true));
        let on_close = close_callback(live.clone());
        let handle = match panel_factory() {
            Some((factory, mount)) => mount.call2(&factory, &container, &on_close),
            None => render_placeholder(&container, &on_close).map(|()| JsValue::UNDEFINED),
        };
        match handle {
            Ok(handle) => Ok(MountedApp {
                container,
                handle,
                live,
            }),
            Err(err) => {
                live.set(false);
                container.remove();
                Err(err.into())
            }
        }
    }

    fn unmount(&mut self, _boundary: &DomBoundary, app: MountedApp) -> Result<()> {
        app.live.set(false);
        let result = match js_sys::Reflect::get(&app.handle, &"unmount".into()) {
            Ok(f) if f.is_function() => f
                .unchecked_into::<js_sys::Function>()
                .call0(&app.handle)
                .map(drop),
            _ => Ok(()),
        };
        app.container.remove();
        result.map_err(|err| ContentError::Dom(describe_js(&err)))
    }
}

fn panel_factory() -> Option<(JsValue, js_sys::Function)> {
    let window = dom::window().ok()?;
    let factory = js_sys::Reflect::get(&window, &PANEL_FACTORY_GLOBAL.into()).ok()?;
    if !factory.is_object() {
        return None;
    }
    let mount = js_sys::Reflect::get(&factory, &"mount".into())
        .ok()?
        .dyn_into::<js_sys::Function>()
        .ok()?;
    Some((factory, mount))
}

/// Minimal UI used when the extension did not register a panel factory
fn render_placeholder(container: &Element, on_close: &JsValue) -> std::result::Result<(), JsValue> {
    let doc = dom::document().map_err(JsValue::from)?;
    let header = doc.create_element("div")?;
    header.set_class_name("promptdock-header");

    let title = doc.create_element("span")?;
    title.set_text_content(Some("Prompts"));
    header.append_child(&title)?;

    let close = doc.create_element("button")?;
    close.set_class_name("promptdock-close");
    close.set_attribute("aria-label", "Close")?;
    close.set_text_content(Some("\u{00D7}"));
    close.add_event_listener_with_callback("click", on_close.unchecked_ref())?;
    header.append_child(&close)?;

    container.append_child(&header)?;
    Ok(())
}

/// The `onClose` handed to one mount. It is owned by JS and outlives the
/// mount, so a call after teardown is ignored rather than reaching a freed
/// closure or closing a later mount.
fn close_callback(live: Rc<Cell<bool>>) -> JsValue {
    Closure::wrap(Box::new(move || {
        if live.get() {
            request_close();
        } else {
            debug!("stale panel close request ignored");
        }
    }) as Box<dyn FnMut()>)
    .into_js_value()
}

/// Close requested by the mounted UI. Deferred one task so the UI's own
/// callback has returned before it is torn down.
fn request_close() {
    let deferred = Closure::once_into_js(|| {
        close_panel();
    });
    let scheduled = dom::window().ok().map(|w| {
        w.set_timeout_with_callback_and_timeout_and_arguments_0(deferred.unchecked_ref(), 0)
    });
    if !matches!(scheduled, Some(Ok(_))) {
        warn!("could not schedule panel close");
    }
}

thread_local! {
    static PANEL: RefCell<Option<PanelController<DomSurface>>> = const { RefCell::new(None) };
}

/// Set up the page's panel controller. Later calls keep the first one.
pub fn init(config: &ContentConfig) {
    PANEL.with(|cell| {
        if let Ok(mut slot) = cell.try_borrow_mut() {
            slot.get_or_insert_with(|| PanelController::new(DomSurface::new(&config.host_element_id)));
        }
    });
}

fn with_panel<R>(f: impl FnOnce(&mut PanelController<DomSurface>) -> R) -> Option<R> {
    PANEL.with(|cell| {
        let Ok(mut slot) = cell.try_borrow_mut() else {
            warn!("panel busy, dropping trigger");
            return None;
        };
        let controller = slot.get_or_insert_with(|| {
            PanelController::new(DomSurface::new(&ContentConfig::default().host_element_id))
        });
        Some(f(controller))
    })
}

pub fn open_panel() -> Result<bool> {
    let opened = with_panel(PanelController::open).unwrap_or(Ok(false))?;
    if opened {
        info!("panel opened");
    }
    Ok(opened)
}

pub fn close_panel() -> bool {
    let closed = with_panel(PanelController::close).unwrap_or(false);
    if closed {
        info!("panel closed");
    }
    closed
}

pub fn is_open() -> bool {
    with_panel(|p| p.phase() == PanelPhase::Open).unwrap_or(false)
}

/// The panel's host node, once created
pub fn host_element() -> Option<Element> {
    with_panel(|p| p.boundary().map(|b| Element::from(b.host.clone()))).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeSurface {
        boundaries_created: usize,
        mounts: usize,
        unmounts: usize,
        fail_unmount: bool,
        fail_mount: bool,
    }

    impl PanelSurface for FakeSurface {
        type Boundary = usize;
        type App = usize;

        fn create_boundary(&mut self) -> Result<usize> {
            self.boundaries_created += 1;
            Ok(self.boundaries_created)
        }

        fn mount(&mut self, _boundary: &usize) -> Result<usize> {
            if self.fail_mount {
                return Err(ContentError::Dom("mount exploded".into()));
            }
            self.mounts += 1;
            Ok(self.mounts)
        }

        fn unmount(&mut self, _boundary: &usize, _app: usize) -> Result<()> {
            self.unmounts += 1;
            if self.fail_unmount {
                Err(ContentError::Dom("unmount exploded".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_double_open_mounts_once() {
        let mut panel = PanelController::new(FakeSurface::default());
        assert!(panel.open().unwrap());
        assert!(!panel.open().unwrap());
        assert_eq!(panel.phase(), PanelPhase::Open);
        assert_eq!(panel.surface().mounts, 1);
    }

    #[test]
    fn test_reopen_reuses_boundary() {
        let mut panel = PanelController::new(FakeSurface::default());
        panel.open().unwrap();
        assert!(panel.close());
        assert_eq!(panel.phase(), PanelPhase::Closed);
        panel.open().unwrap();

        assert_eq!(panel.surface().boundaries_created, 1);
        assert_eq!(panel.surface().mounts, 2);
        assert_eq!(panel.boundary(), Some(&1));
    }

    #[test]
    fn test_close_when_closed_is_noop() {
        let mut panel = PanelController::new(FakeSurface::default());
        assert!(!panel.close());
        assert_eq!(panel.surface().unmounts, 0);
    }

    #[test]
    fn test_unmount_failure_still_closes() {
        let mut panel = PanelController::new(FakeSurface {
            fail_unmount: true,
            ..Default::default()
        });
        panel.open().unwrap();
        assert!(panel.close());
        assert_eq!(panel.phase(), PanelPhase::Closed);

        assert!(panel.open().unwrap());
        assert_eq!(panel.surface().mounts, 2);
    }

    #[test]
    fn test_failed_mount_stays_closed_and_keeps_boundary() {
        let mut panel = PanelController::new(FakeSurface {
            fail_mount: true,
            ..Default::default()
        });
        assert!(panel.open().is_err());
        assert_eq!(panel.phase(), PanelPhase::Closed);
        assert_eq!(panel.boundary(), Some(&1));
    }
}
