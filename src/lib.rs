//! Korean/Hanja dictionary with lazily loaded related-word panels.
//!
//! The [`panel::DetailsView`] owns one detail panel per search-result entry
//! and decides when a panel needs its related words; [`loader`] fetches and
//! renders them through any [`loader::RelatedWordsSource`], such as the
//! in-process [`dictionary::DictionarySource`] or the HTTP client.

pub mod dictionary;
pub mod loader;
pub mod panel;
pub mod render;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "web")]
pub mod web;

pub use dictionary::{Dictionary, DictionaryError, HanjaCharacter, HanjaReading, KoreanWord};
pub use loader::{
    FetchError, LoadOutcome, LoadRequest, LoadedPanel, Messages, RelatedQuery,
    RelatedWordsSource, Variant, load_related_words,
};
pub use panel::{DetailsView, LoadTicket, Panel, PanelState, Toggle};
pub use render::{Escaping, RelatedWord};
