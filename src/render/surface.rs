use std::sync::{Arc, Mutex, MutexGuard};

/// What a render surface currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SurfaceContent {
    #[default]
    Empty,
    Placeholder(String),
    Svg(String),
}

/// Shared handle to the area a graph is drawn into.
///
/// Clones point at the same surface, so the controller and the view observe
/// the same content.
#[derive(Debug, Clone, Default)]
pub struct RenderSurface {
    inner: Arc<Mutex<SurfaceContent>>,
}

impl RenderSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SurfaceContent> {
        // A panicking writer can only leave a whole SurfaceContent behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn replace(&self, content: SurfaceContent) {
        *self.state() = content;
    }

    pub fn clear(&self) {
        self.replace(SurfaceContent::Empty);
    }

    pub fn show_placeholder(&self, text: impl Into<String>) {
        self.replace(SurfaceContent::Placeholder(text.into()));
    }

    pub fn set_svg(&self, svg: String) {
        self.replace(SurfaceContent::Svg(svg));
    }

    pub fn content(&self) -> SurfaceContent {
        self.state().clone()
    }

    /// Text suitable for writing to disk or a terminal
    pub fn snapshot(&self) -> String {
        match self.content() {
            SurfaceContent::Empty => String::new(),
            SurfaceContent::Placeholder(text) | SurfaceContent::Svg(text) => text,
        }
    }
}
