//! The display seam: whatever shows template lists, search results and messages.

use crate::templates::Template;
use api_shared::SearchHit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

pub trait PresentationSurface {
    fn render_templates(&self, templates: &[Template]);

    fn render_search_results(&self, results: &[SearchHit]);

    fn show_message(&self, kind: MessageKind, text: &str);
}
