use crate::loader::{LoadOutcome, LoadRequest, LoadedPanel, RelatedWordsSource, Variant};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const CONTAINER_CLASS: &str = "result-item";
pub const COLLAPSED_CLASS: &str = "collapsed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Unloaded,
    Loading,
    Loaded(LoadOutcome),
}

/// Detail panel of one search-result entry.
#[derive(Debug, Clone)]
pub struct Panel {
    key: String,
    visible: bool,
    state: PanelState,
    content: String,
}

impl Panel {
    fn new(key: String) -> Self {
        Self {
            key,
            visible: false,
            state: PanelState::Unloaded,
            content: String::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The enclosing result item is collapsed exactly when the panel is hidden.
    pub fn is_collapsed(&self) -> bool {
        !self.visible
    }

    pub fn container_class(&self) -> String {
        if self.is_collapsed() {
            format!("{CONTAINER_CLASS} {COLLAPSED_CLASS}")
        } else {
            CONTAINER_CLASS.to_string()
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, PanelState::Loaded(_))
    }

    /// Rendered panel markup; empty until a load completes.
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Handed out by [`DetailsView::toggle`] when a panel needs its related words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub request: LoadRequest,
}

impl LoadTicket {
    pub fn key(&self) -> &str {
        &self.request.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    /// No panel registered under the key. Nothing changed.
    Missing,
    Toggled {
        visible: bool,
        load: Option<LoadTicket>,
    },
}

impl Toggle {
    pub fn ticket(&self) -> Option<&LoadTicket> {
        match self {
            Toggle::Toggled { load, .. } => load.as_ref(),
            Toggle::Missing => None,
        }
    }
}

/// Panel state for one rendered result list, keyed by entry key.
#[derive(Debug, Clone)]
pub struct DetailsView {
    panels: Vec<Panel>,
    index: HashMap<String, usize>,
    variant: Variant,
}

impl DetailsView {
    pub fn new(variant: Variant) -> Self {
        Self {
            panels: Vec::new(),
            index: HashMap::new(),
            variant,
        }
    }

    pub fn with_keys<I, K>(variant: Variant, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut view = Self::new(variant);
        for key in keys {
            view.insert(key);
        }
        view
    }

    /// Registers a hidden, unloaded panel. Existing keys are left untouched.
    pub fn insert(&mut self, key: impl Into<String>) -> &Panel {
        let key = key.into();
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                let position = self.panels.len();
                self.index.insert(key.clone(), position);
                self.panels.push(Panel::new(key));
                position
            }
        };
        &self.panels[position]
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn panel(&self, key: &str) -> Option<&Panel> {
        self.index.get(key).map(|&position| &self.panels[position])
    }

    pub fn panels(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    fn panel_mut(&mut self, key: &str) -> Option<&mut Panel> {
        let position = *self.index.get(key)?;
        self.panels.get_mut(position)
    }

    /// Flips a panel's visibility.
    ///
    /// Showing a panel that has never been loaded moves it to
    /// [`PanelState::Loading`] and returns a ticket; the caller runs the
    /// load and hands the result to [`DetailsView::complete`]. A panel that
    /// is already loading gets no second ticket.
    pub fn toggle(&mut self, key: &str) -> Toggle {
        let variant = self.variant.clone();
        let Some(panel) = self.panel_mut(key) else {
            debug!(key, "Toggle for unknown panel ignored");
            return Toggle::Missing;
        };
        panel.visible = !panel.visible;
        let load = if panel.visible && panel.state == PanelState::Unloaded {
            panel.state = PanelState::Loading;
            Some(LoadTicket {
                request: LoadRequest {
                    key: panel.key.clone(),
                    variant,
                },
            })
        } else {
            None
        };
        Toggle::Toggled {
            visible: panel.visible,
            load,
        }
    }

    /// Stores a finished load. Returns `false` when the panel was not waiting for one.
    pub fn complete(&mut self, ticket: LoadTicket, loaded: LoadedPanel) -> bool {
        let Some(panel) = self.panel_mut(ticket.key()) else {
            warn!(key = ticket.key(), "Load completed for unknown panel");
            return false;
        };
        if panel.state != PanelState::Loading {
            warn!(key = ticket.key(), state = ?panel.state, "Discarding unexpected load result");
            return false;
        }
        debug!(key = ticket.key(), outcome = %loaded.outcome, "Panel loaded");
        panel.state = PanelState::Loaded(loaded.outcome);
        panel.content = loaded.html;
        true
    }

    /// Toggles a panel and, when needed, loads it from `source` before returning.
    pub async fn toggle_and_load<S>(&mut self, key: &str, source: &S) -> Toggle
    where
        S: RelatedWordsSource + ?Sized,
    {
        let toggle = self.toggle(key);
        if let Some(ticket) = toggle.ticket().cloned() {
            let loaded = crate::loader::load_related_words(source, &ticket.request).await;
            self.complete(ticket, loaded);
        }
        toggle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Messages;
    use crate::loader::testing::{ErrorCounter, ScriptedSource, word};
    use tracing_subscriber::layer::SubscriberExt;

    fn korean_view(keys: &[&str]) -> DetailsView {
        DetailsView::with_keys(
            Variant::enhanced(
                "학교",
                Messages {
                    no_results: "관련 단어 없음".to_string(),
                    error: "오류".to_string(),
                },
            ),
            keys.iter().copied(),
        )
    }

    #[test]
    fn panels_start_hidden_and_unloaded() {
        let view = korean_view(&["學", "校"]);
        let panel = view.panel("學").unwrap();
        assert!(!panel.is_visible());
        assert!(panel.is_collapsed());
        assert_eq!(panel.state(), &PanelState::Unloaded);
        assert_eq!(panel.container_class(), "result-item collapsed");
        assert_eq!(
            view.panels().map(Panel::key).collect::<Vec<_>>(),
            vec!["學", "校"]
        );
    }

    #[test]
    fn insert_is_idempotent() {
        let mut view = korean_view(&["學"]);
        view.toggle("學");
        view.insert("學");
        assert_eq!(view.len(), 1);
        assert!(view.panel("學").unwrap().is_visible());
    }

    #[test]
    fn unknown_key_is_a_no_op() {
        let mut view = korean_view(&["學"]);
        assert_eq!(view.toggle("校"), Toggle::Missing);
        assert!(!view.panel("學").unwrap().is_visible());
    }

    #[test]
    fn first_show_issues_a_ticket() {
        let mut view = korean_view(&["學"]);
        let toggle = view.toggle("學");
        let ticket = toggle.ticket().expect("ticket");
        assert_eq!(ticket.key(), "學");
        assert_eq!(ticket.request.variant, *view.variant());
        assert_eq!(view.panel("學").unwrap().state(), &PanelState::Loading);
        assert_eq!(view.panel("學").unwrap().container_class(), "result-item");
    }

    #[test]
    fn hiding_never_issues_a_ticket() {
        let mut view = korean_view(&["學"]);
        view.toggle("學");
        let toggle = view.toggle("學");
        assert_eq!(
            toggle,
            Toggle::Toggled {
                visible: false,
                load: None
            }
        );
    }

    #[test]
    fn in_flight_load_blocks_duplicate_tickets() {
        let mut view = korean_view(&["學"]);
        let first = view.toggle("學").ticket().cloned().expect("ticket");
        view.toggle("學");
        assert!(view.toggle("學").ticket().is_none());

        let loaded = LoadedPanel {
            outcome: LoadOutcome::Empty,
            html: "<p>관련 단어 없음</p>".to_string(),
        };
        assert!(view.complete(first.clone(), loaded.clone()));
        assert!(!view.complete(first, loaded));
        assert!(view.panel("學").unwrap().is_loaded());
    }

    #[test]
    fn collapsed_class_tracks_visibility() {
        let mut view = korean_view(&["學"]);
        for _ in 0..5 {
            view.toggle("學");
            let panel = view.panel("學").unwrap();
            assert_eq!(panel.is_collapsed(), !panel.is_visible());
            assert_eq!(
                panel.container_class().contains(COLLAPSED_CLASS),
                !panel.is_visible()
            );
        }
    }

    #[tokio::test]
    async fn repeated_toggles_fetch_once() {
        let source = ScriptedSource::returning(vec![word("학생", "學生", "student")]);
        let mut view = korean_view(&["學"]);
        view.toggle_and_load("學", &source).await;
        view.toggle_and_load("學", &source).await;
        assert!(!view.panel("學").unwrap().is_visible());
        for _ in 0..4 {
            view.toggle_and_load("學", &source).await;
        }
        assert_eq!(source.call_count(), 1);
        let panel = view.panel("學").unwrap();
        assert_eq!(panel.state(), &PanelState::Loaded(LoadOutcome::WithResults(1)));
        assert!(panel.content().contains("<strong>학생</strong>"));
    }

    #[tokio::test]
    async fn never_shown_panel_never_fetches() {
        let source = ScriptedSource::returning(Vec::new());
        let mut view = korean_view(&["學", "校"]);
        view.toggle_and_load("學", &source).await;
        view.toggle_and_load("없음", &source).await;
        assert_eq!(source.call_count(), 1);
        assert_eq!(source.queries.lock()[0].hanja, "學");
        assert_eq!(view.panel("校").unwrap().state(), &PanelState::Unloaded);
    }

    #[tokio::test]
    async fn empty_response_shows_no_results_message() {
        let source = ScriptedSource::returning(Vec::new());
        let mut view = korean_view(&["學"]);
        view.toggle_and_load("學", &source).await;
        let panel = view.panel("學").unwrap();
        assert_eq!(panel.content(), "<p>관련 단어 없음</p>");
        assert_eq!(panel.state(), &PanelState::Loaded(LoadOutcome::Empty));
        assert!(panel.is_loaded());
    }

    #[tokio::test]
    async fn failed_fetch_shows_error_and_still_marks_loaded() {
        let counter = ErrorCounter::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(counter.clone()));

        let source = ScriptedSource::failing();
        let mut view = korean_view(&["學"]);
        view.toggle_and_load("學", &source).await;
        let panel = view.panel("學").unwrap();
        assert_eq!(panel.content(), "<p>오류</p>");
        assert_eq!(panel.state(), &PanelState::Loaded(LoadOutcome::Failed));
        assert_eq!(counter.count(), 1);

        view.toggle_and_load("學", &source).await;
        view.toggle_and_load("學", &source).await;
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn baseline_view_renders_unescaped_markup() {
        let source = ScriptedSource::returning(vec![word("a&b", "甲", "x")]);
        let mut view = DetailsView::with_keys(Variant::Baseline, ["甲"]);
        view.toggle_and_load("甲", &source).await;
        assert!(view.panel("甲").unwrap().content().contains("a&b"));
    }
}
