//! Markup rendering seam.
//!
//! Rendering is an external collaborator: a pure function from accumulated
//! text to presentable markup. Partial input mid-stream may be rejected by a
//! renderer; callers then fall back to raw text for that flush only.

use serde::Serialize;
use tracing::debug;

use crate::error::Result;

pub trait MarkupRenderer: Send + Sync {
    fn render(&self, text: &str) -> Result<String>;
}

/// Identity renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRenderer;

impl MarkupRenderer for PlainTextRenderer {
    fn render(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderMode {
    Markup,
    /// The renderer failed; `markup` holds the raw text.
    RawFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    pub markup: String,
    pub mode: RenderMode,
}

/// Renders `text`, degrading to raw text when the renderer fails.
pub fn render_with_fallback(renderer: &dyn MarkupRenderer, text: &str) -> Rendered {
    match renderer.render(text) {
        Ok(markup) => Rendered {
            markup,
            mode: RenderMode::Markup,
        },
        Err(e) => {
            debug!(error = %e, "render failed, showing raw text");
            Rendered {
                markup: text.to_string(),
                mode: RenderMode::RawFallback,
            }
        }
    }
}
