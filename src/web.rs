use crate::dictionary::{
    CachedSource, DEFAULT_RELATED_LIMIT, Dictionary, DictionarySource, HanjaCharacter,
    HanjaReading, KoreanWord,
};
use crate::loader::{Messages, RelatedQuery, RelatedWordsSource, Variant, encode_component};
use crate::panel::DetailsView;
use crate::render::RelatedWord;
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub dictionary: Arc<Dictionary>,
    pub related: CachedSource<DictionarySource>,
    pub messages: Messages,
    pub theme: WebTheme,
}

impl AppState {
    pub fn new(dictionary: Arc<Dictionary>, config: &WebConfig) -> Self {
        let source = DictionarySource::new(Arc::clone(&dictionary), config.related_limit);
        Self {
            dictionary,
            related: CachedSource::new(source, config.cache_size),
            messages: config.messages.clone(),
            theme: config.theme,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    input_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-3xl w-full space-y-6",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                input_class: "rounded-md border border-slate-300 px-3 py-2 w-full",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-8",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary px-4",
                input_class: "form-control",
            },
        }
    }

    fn head_tags(&self) -> &'static str {
        if self.use_bootstrap {
            r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#
        } else {
            r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub related_limit: usize,
    pub cache_size: usize,
    pub messages: Messages,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            related_limit: DEFAULT_RELATED_LIMIT,
            cache_size: 1024,
            messages: Messages::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig, dictionary: Arc<Dictionary>) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(dictionary, &config));
    let router = build_router(state);
    info!(
        %config.addr,
        theme = %config.theme,
        related_limit = config.related_limit,
        cache = config.cache_size,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/search", get(search_html).post(search_form))
        .route("/related-words", get(related_words))
        .route("/api/hanja", get(api_hanja))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "hanja-gloss-web" }))
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    Html(render_home(state.theme, state.dictionary.word_count()))
}

fn render_home(theme: WebTheme, word_count: usize) -> String {
    let chrome = Chrome::new(theme);
    format!(
        r#"<!DOCTYPE html>
<html lang="ko">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Hanja Gloss</title>
    {head_tags}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Hanja Gloss</h1>
        <p class="{lede_class}">Look up the Hanja behind {word_count} Korean words and explore the words that share them.</p>
        <form action="/search" method="POST" class="search-form flex gap-3">
          <input type="text" name="word" class="{input_class}" placeholder="학교" required>
          <button type="submit" class="{button_class}">Search</button>
        </form>
      </div>
    </main>
  </body>
</html>"#,
        head_tags = chrome.head_tags(),
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        input_class = chrome.input_class,
        button_class = chrome.button_class,
        word_count = word_count,
    )
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let chrome = Chrome::new(theme);
    let message = crate::render::html_escape(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="ko">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Hanja Gloss • Error</title>
    {head_tags}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to search</a>
      </div>
    </main>
  </body>
</html>"#,
        head_tags = chrome.head_tags(),
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = message,
    )
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    word: Option<String>,
    open: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchForm {
    word: String,
}

#[derive(Debug, Deserialize)]
struct RelatedParams {
    hanja: Option<String>,
    original_word: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HanjaParams {
    word: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HanjaPayload {
    word: String,
    characters: Vec<HanjaCharacterPayload>,
    entries: Vec<KoreanWordPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HanjaCharacterPayload {
    character: String,
    readings: Vec<ReadingPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReadingPayload {
    korean: String,
    meaning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KoreanWordPayload {
    id: u32,
    word: String,
    hanja: Option<String>,
    glossary: Option<String>,
}

impl From<&HanjaCharacter> for HanjaCharacterPayload {
    fn from(value: &HanjaCharacter) -> Self {
        Self {
            character: value.character.to_string(),
            readings: value.readings.iter().map(ReadingPayload::from).collect(),
        }
    }
}

impl From<&HanjaReading> for ReadingPayload {
    fn from(value: &HanjaReading) -> Self {
        Self {
            korean: value.korean.clone(),
            meaning: value.meaning.clone(),
        }
    }
}

impl From<&KoreanWord> for KoreanWordPayload {
    fn from(value: &KoreanWord) -> Self {
        Self {
            id: value.id,
            word: value.word.clone(),
            hanja: value.hanja.clone(),
            glossary: value.glossary.clone(),
        }
    }
}

async fn related_words(
    State(state): State<SharedState>,
    Query(params): Query<RelatedParams>,
) -> Result<Json<Vec<RelatedWord>>, ApiError> {
    let hanja = params
        .hanja
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `hanja` is required"))?;
    let original_word = params
        .original_word
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty());
    let query = RelatedQuery::new(hanja, original_word);
    state.related.fetch(&query).await.map(Json).map_err(|err| {
        error!(hanja, error = %err, "Related-words lookup failed");
        ApiError::internal(err.to_string())
    })
}

async fn api_hanja(
    State(state): State<SharedState>,
    Query(params): Query<HanjaParams>,
) -> Result<Json<HanjaPayload>, ApiError> {
    let word = params
        .word
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `word` is required"))?;
    let entries = state.dictionary.words_by_korean(word);
    if entries.is_empty() {
        return Err(ApiError::not_found(format!("No entry found for word {word:?}")));
    }
    let characters = state
        .dictionary
        .hanja_meanings_for_word(word)
        .unwrap_or_default();
    Ok(Json(HanjaPayload {
        word: word.to_string(),
        characters: characters.iter().map(HanjaCharacterPayload::from).collect(),
        entries: entries.into_iter().map(KoreanWordPayload::from).collect(),
    }))
}

async fn search_html(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let word = params.word.unwrap_or_default();
    Html(render_search(&state, &word, params.open.as_deref()).await)
}

async fn search_form(
    State(state): State<SharedState>,
    Form(form): Form<SearchForm>,
) -> impl IntoResponse {
    Html(render_search(&state, &form.word, None).await)
}

struct HanjaItem {
    character: String,
    readings: Vec<HanjaReading>,
    container_class: String,
    panel_id: String,
    panel_class: &'static str,
    toggle_href: String,
    toggle_label: &'static str,
    panel_html: String,
}

struct EntryItem {
    word: String,
    hanja: String,
    glossary: String,
}

impl From<&KoreanWord> for EntryItem {
    fn from(value: &KoreanWord) -> Self {
        Self {
            word: value.word.clone(),
            hanja: value.hanja.clone().unwrap_or_default(),
            glossary: value.glossary.clone().unwrap_or_default(),
        }
    }
}

async fn render_search(state: &AppState, word: &str, open: Option<&str>) -> String {
    let word = word.trim();
    if word.is_empty() {
        return render_error_page(state.theme, "Enter a word to search.");
    }
    info!(word, open, "Search");
    let characters = state
        .dictionary
        .hanja_meanings_for_word(word)
        .unwrap_or_default();
    let entries = state
        .dictionary
        .words_by_korean(word)
        .into_iter()
        .map(EntryItem::from)
        .collect();

    let variant = Variant::enhanced(word, state.messages.clone());
    let mut view = DetailsView::with_keys(
        variant,
        characters.iter().map(|c| c.character.to_string()),
    );
    if let Some(key) = open {
        view.toggle_and_load(key, &state.related).await;
    }

    let search_href = format!("/search?word={}", encode_component(word));
    let items = characters
        .iter()
        .filter_map(|character| {
            let key = character.character.to_string();
            let panel = view.panel(&key)?;
            let (toggle_href, toggle_label) = if panel.is_visible() {
                (search_href.clone(), "Hide related words")
            } else {
                (
                    format!("{search_href}&open={}", encode_component(&key)),
                    "Show related words",
                )
            };
            Some(HanjaItem {
                readings: character.readings.clone(),
                container_class: panel.container_class(),
                panel_id: format!("details-{key}"),
                panel_class: if panel.is_visible() {
                    "details visible"
                } else {
                    "details"
                },
                toggle_href,
                toggle_label,
                panel_html: panel.content().to_string(),
                character: key,
            })
        })
        .collect();

    let template = SearchTemplate {
        chrome: Chrome::new(state.theme),
        word,
        items,
        entries,
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(state.theme, err.to_string()))
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="ko">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Hanja Gloss • {{ word }}</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
    <style>.details { display: none; } .details.visible { display: block; }</style>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <h1 class="{{ chrome.headline_class }}">{{ word }}</h1>
        <form action="/search" method="POST" class="search-form flex gap-3">
          <input type="text" name="word" value="{{ word }}" class="{{ chrome.input_class }}" required>
          <button type="submit" class="{{ chrome.button_class }}">Search</button>
        </form>

        <section id="hanja">
          <h2 class="text-xl font-semibold mb-2">Hanja</h2>
          {% if items.len() == 0 %}
          <p class="{{ chrome.lede_class }}">No Hanja found for this word.</p>
          {% else %}
          <ul class="space-y-3 list-unstyled">
            {% for item in items %}
            <li class="{{ item.container_class }}">
              <div class="flex items-baseline gap-3">
                <span class="text-3xl font-bold">{{ item.character }}</span>
                <span>
                  {% for reading in item.readings %}
                  <span class="reading">{{ reading.korean }} : {{ reading.meaning }}</span>
                  {% endfor %}
                </span>
                <a href="{{ item.toggle_href }}" class="toggle-details text-sm">{{ item.toggle_label }}</a>
              </div>
              <div id="{{ item.panel_id }}" class="{{ item.panel_class }}">{{ item.panel_html|safe }}</div>
            </li>
            {% endfor %}
          </ul>
          {% endif %}
        </section>

        <section id="korean">
          <h2 class="text-xl font-semibold mb-2">Dictionary entries</h2>
          {% if entries.len() == 0 %}
          <p class="{{ chrome.lede_class }}">No entries found for this word.</p>
          {% else %}
          <ul class="space-y-1 list-unstyled">
            {% for entry in entries %}
            <li class="korean-entry">
              <strong>{{ entry.word }}</strong>
              {% if !entry.hanja.is_empty() %}({{ entry.hanja }}){% endif %}
              {% if !entry.glossary.is_empty() %} : {{ entry.glossary }}{% endif %}
            </li>
            {% endfor %}
          </ul>
          {% endif %}
        </section>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct SearchTemplate<'a> {
    chrome: Chrome,
    word: &'a str,
    items: Vec<HanjaItem>,
    entries: Vec<EntryItem>,
}
