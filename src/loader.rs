use crate::render::{Escaping, RelatedWord, render_message, render_related_words};
use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use tracing::{debug, error};

/// Path of the related-words endpoint, relative to the server root.
pub const RELATED_WORDS_PATH: &str = "/related-words";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelatedQuery {
    pub hanja: String,
    pub original_word: Option<String>,
}

impl RelatedQuery {
    pub fn new(hanja: impl Into<String>, original_word: Option<String>) -> Self {
        Self {
            hanja: hanja.into(),
            original_word,
        }
    }

    pub fn to_query_string(&self) -> String {
        let mut query = format!("hanja={}", encode_component(&self.hanja));
        if let Some(word) = &self.original_word {
            query.push_str("&original_word=");
            query.push_str(&encode_component(word));
        }
        query
    }
}

pub const DEFAULT_NO_RESULTS: &str = "No related words found.";
pub const DEFAULT_ERROR: &str = "Error loading data.";

/// Localized fallback texts shown inside a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub no_results: String,
    pub error: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            no_results: DEFAULT_NO_RESULTS.to_string(),
            error: DEFAULT_ERROR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedContext {
    pub original_word: String,
    pub messages: Messages,
}

/// How a panel load is requested and rendered.
///
/// `Baseline` mirrors the first panel version: no search context in the
/// request, fixed English fallbacks and unescaped output. `Enhanced`
/// carries the original search word and the caller's messages and always
/// escapes server values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Baseline,
    Enhanced(EnhancedContext),
}

impl Variant {
    pub fn enhanced(original_word: impl Into<String>, messages: Messages) -> Self {
        Variant::Enhanced(EnhancedContext {
            original_word: original_word.into(),
            messages,
        })
    }

    pub fn escaping(&self) -> Escaping {
        match self {
            Variant::Baseline => Escaping::Raw,
            Variant::Enhanced(_) => Escaping::Escaped,
        }
    }

    pub fn no_results_message(&self) -> &str {
        match self {
            Variant::Baseline => DEFAULT_NO_RESULTS,
            Variant::Enhanced(ctx) => &ctx.messages.no_results,
        }
    }

    pub fn error_message(&self) -> &str {
        match self {
            Variant::Baseline => DEFAULT_ERROR,
            Variant::Enhanced(ctx) => &ctx.messages.error,
        }
    }

    pub fn query(&self, key: &str) -> RelatedQuery {
        match self {
            Variant::Baseline => RelatedQuery::new(key, None),
            Variant::Enhanced(ctx) => RelatedQuery::new(key, Some(ctx.original_word.clone())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[cfg(feature = "client")]
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("malformed related-words payload: {0}")]
    Body(#[from] serde_json::Error),
    #[error("related-words lookup failed: {0}")]
    Lookup(String),
}

/// Anything able to answer a related-words query.
#[async_trait]
pub trait RelatedWordsSource: Send + Sync {
    async fn fetch(&self, query: &RelatedQuery) -> Result<Vec<RelatedWord>, FetchError>;
}

/// Everything the loader needs for one panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub key: String,
    pub variant: Variant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    WithResults(usize),
    Empty,
    Failed,
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::WithResults(count) => write!(f, "{count} related words"),
            LoadOutcome::Empty => write!(f, "empty"),
            LoadOutcome::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPanel {
    pub outcome: LoadOutcome,
    pub html: String,
}

/// Fetches related words once and renders them into panel markup.
///
/// Never fails: transport and payload errors are logged and rendered as
/// the variant's error message.
pub async fn load_related_words<S>(source: &S, request: &LoadRequest) -> LoadedPanel
where
    S: RelatedWordsSource + ?Sized,
{
    let query = request.variant.query(&request.key);
    match source.fetch(&query).await {
        Ok(words) if words.is_empty() => {
            debug!(hanja = %request.key, "No related words");
            LoadedPanel {
                outcome: LoadOutcome::Empty,
                html: render_message(request.variant.no_results_message()),
            }
        }
        Ok(words) => {
            debug!(hanja = %request.key, count = words.len(), "Rendering related words");
            LoadedPanel {
                outcome: LoadOutcome::WithResults(words.len()),
                html: render_related_words(&words, request.variant.escaping()),
            }
        }
        Err(err) => {
            error!(hanja = %request.key, error = %err, "Error fetching related words");
            LoadedPanel {
                outcome: LoadOutcome::Failed,
                html: render_message(request.variant.error_message()),
            }
        }
    }
}
