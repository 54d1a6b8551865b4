//! In-memory Korean/Hanja dictionary.
//!
//! Built from two plain-text sources:
//!
//! * a kengdic TSV export (`id`, `surface`, `hanja`, `gloss` columns, header row required);
//! * a Hanja reading list where `[group]` lines open a section and
//!   `字=reading,definition,...` lines describe one character.

use crate::loader::{FetchError, RelatedQuery, RelatedWordsSource};
use crate::render::RelatedWord;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_RELATED_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("word list header is missing the `{0}` column")]
    MissingColumn(&'static str),
    #[error("invalid id {value:?} on line {line}")]
    InvalidId { line: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KoreanWord {
    pub id: u32,
    pub word: String,
    pub hanja: Option<String>,
    pub glossary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HanjaReading {
    /// Hangul readings, comma separated.
    pub korean: String,
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HanjaCharacter {
    pub character: char,
    pub readings: Vec<HanjaReading>,
}

#[derive(Debug, Default)]
pub struct Dictionary {
    words: Vec<KoreanWord>,
    by_surface: HashMap<String, Vec<usize>>,
    characters: HashMap<char, Vec<HanjaReading>>,
}

impl Dictionary {
    pub fn open(
        words_path: impl AsRef<Path>,
        hanja_path: impl AsRef<Path>,
    ) -> Result<Self, DictionaryError> {
        let words_path = words_path.as_ref();
        let hanja_path = hanja_path.as_ref();
        info!(words = %words_path.display(), hanja = %hanja_path.display(), "Loading dictionary");
        let words = BufReader::new(File::open(words_path)?);
        let hanja = BufReader::new(File::open(hanja_path)?);
        Self::from_readers(words, hanja)
    }

    pub fn from_readers<W: BufRead, H: BufRead>(
        words: W,
        hanja: H,
    ) -> Result<Self, DictionaryError> {
        let mut dictionary = Self::default();
        for word in parse_word_list(words)? {
            dictionary.push_word(word);
        }
        for line in hanja.lines() {
            if let Some((character, reading)) = parse_hanja_line(&line?) {
                dictionary
                    .characters
                    .entry(character)
                    .or_default()
                    .push(reading);
            }
        }
        info!(
            words = dictionary.words.len(),
            characters = dictionary.characters.len(),
            "Dictionary ready"
        );
        Ok(dictionary)
    }

    fn push_word(&mut self, word: KoreanWord) {
        let position = self.words.len();
        self.by_surface
            .entry(word.word.clone())
            .or_default()
            .push(position);
        self.words.push(word);
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// All entries spelled `word`, in file order.
    pub fn words_by_korean(&self, word: &str) -> Vec<&KoreanWord> {
        self.by_surface
            .get(word)
            .map(|positions| positions.iter().map(|&idx| &self.words[idx]).collect())
            .unwrap_or_default()
    }

    pub fn readings(&self, character: char) -> &[HanjaReading] {
        self.characters
            .get(&character)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Readings for every Hanja character of `word`.
    ///
    /// `None` when the word is unknown or carries no Hanja spelling. The
    /// first entry with a Hanja spelling wins; characters appear once, in
    /// spelling order, and characters without readings are skipped.
    pub fn hanja_meanings_for_word(&self, word: &str) -> Option<Vec<HanjaCharacter>> {
        let hanja = self
            .words_by_korean(word)
            .into_iter()
            .find_map(|entry| entry.hanja.as_deref());
        let Some(hanja) = hanja else {
            debug!(word, "No Hanja found for word");
            return None;
        };
        let mut seen = Vec::new();
        let mut results = Vec::new();
        for character in hanja.chars() {
            if seen.contains(&character) {
                continue;
            }
            seen.push(character);
            let readings = self.readings(character);
            if !readings.is_empty() {
                results.push(HanjaCharacter {
                    character,
                    readings: readings.to_vec(),
                });
            }
        }
        Some(results)
    }

    /// Entries whose Hanja spelling contains `hanja`, excluding `original_word` itself.
    pub fn related_words(
        &self,
        hanja: &str,
        original_word: Option<&str>,
        limit: usize,
    ) -> Vec<RelatedWord> {
        if hanja.is_empty() {
            return Vec::new();
        }
        self.words
            .iter()
            .filter(|entry| Some(entry.word.as_str()) != original_word)
            .filter_map(|entry| {
                let spelling = entry.hanja.as_deref()?;
                spelling.contains(hanja).then(|| RelatedWord {
                    word: entry.word.clone(),
                    hanja: spelling.to_string(),
                    lemma: entry.glossary.clone().unwrap_or_default(),
                })
            })
            .take(limit)
            .collect()
    }
}

/// Answers related-word queries from a shared dictionary.
#[derive(Debug, Clone)]
pub struct DictionarySource {
    dictionary: Arc<Dictionary>,
    limit: usize,
}

impl DictionarySource {
    pub fn new(dictionary: Arc<Dictionary>, limit: usize) -> Self {
        Self { dictionary, limit }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }
}

#[async_trait]
impl RelatedWordsSource for DictionarySource {
    async fn fetch(&self, query: &RelatedQuery) -> Result<Vec<RelatedWord>, FetchError> {
        Ok(self.dictionary.related_words(
            &query.hanja,
            query.original_word.as_deref(),
            self.limit,
        ))
    }
}

/// Memoizes successful lookups of another source.
pub struct CachedSource<S> {
    inner: S,
    cache: Mutex<LruCache<RelatedQuery, Vec<RelatedWord>>>,
}

impl<S> CachedSource<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RelatedWordsSource> RelatedWordsSource for CachedSource<S> {
    async fn fetch(&self, query: &RelatedQuery) -> Result<Vec<RelatedWord>, FetchError> {
        let cached = self.cache.lock().get(query).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let words = self.inner.fetch(query).await?;
        self.cache.lock().put(query.clone(), words.clone());
        Ok(words)
    }
}

fn parse_word_list<R: BufRead>(reader: R) -> Result<Vec<KoreanWord>, DictionaryError> {
    let mut lines = reader.lines().enumerate();
    let header = match lines.next() {
        Some((_, line)) => line?,
        None => return Ok(Vec::new()),
    };
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let column = |name: &'static str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or(DictionaryError::MissingColumn(name))
    };
    let id_col = column("id")?;
    let surface_col = column("surface")?;
    let hanja_col = column("hanja")?;
    let gloss_col = column("gloss")?;

    let mut words = Vec::new();
    for (idx, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let get = |i: usize| fields.get(i).map(|f| f.trim()).unwrap_or("");
        let surface = get(surface_col);
        if surface.is_empty() {
            continue;
        }
        let id = get(id_col).parse().map_err(|_| DictionaryError::InvalidId {
            line: idx + 1,
            value: get(id_col).to_string(),
        })?;
        words.push(KoreanWord {
            id,
            word: surface.to_string(),
            hanja: non_empty(get(hanja_col)),
            glossary: non_empty(get(gloss_col)),
        });
    }
    Ok(words)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Parses `字=part,part` into the character and its split readings.
fn parse_hanja_line(line: &str) -> Option<(char, HanjaReading)> {
    let line = line.trim();
    if line.starts_with('[') && line.ends_with(']') {
        return None;
    }
    let (head, rest) = line.split_once('=')?;
    let mut chars = head.trim().chars();
    let character = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let (korean, meaning): (Vec<&str>, Vec<&str>) = rest
        .split(',')
        .map(str::trim)
        .partition(|part| part.chars().any(is_hangul));
    Some((
        character,
        HanjaReading {
            korean: korean.join(", "),
            meaning: meaning.join(", "),
        },
    ))
}

fn is_hangul(ch: char) -> bool {
    matches!(ch,
        '\u{1100}'..='\u{11FF}'
        | '\u{3130}'..='\u{318F}'
        | '\u{A960}'..='\u{A97F}'
        | '\u{AC00}'..='\u{D7A3}'
        | '\u{D7B0}'..='\u{D7FF}')
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Dictionary;

    pub const WORDS_TSV: &str = "id\tsurface\thanja\tgloss\tlevel\n\
1\t학교\t學校\tschool\tA\n\
2\t학생\t學生\tstudent\tA\n\
3\t대학\t大學\tuniversity\tB\n\
4\t혼자\t\talone\tA\n\
5\t학교\t學敎\tteaching\tC\n\
\n\
6\t과학\t科學\t\tB\n";

    pub const HANJA_TXT: &str = "[학]\n\
學=배울, 학,learn,study\n\
[교]\n\
校=학교, 교,school\n\
敎=가르칠, 교,teach\n\
生=날, 생,life\n\
生=서투를, 생,unripe\n\
not a hanja line\n";

    pub fn dictionary() -> Dictionary {
        Dictionary::from_readers(WORDS_TSV.as_bytes(), HANJA_TXT.as_bytes())
            .expect("fixture loads")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::dictionary;
    use super::*;

    #[test]
    fn loads_words_and_characters() {
        let dict = dictionary();
        assert_eq!(dict.word_count(), 6);
        assert_eq!(dict.character_count(), 4);
        assert_eq!(dict.readings('生').len(), 2);
    }

    #[test]
    fn splits_hangul_readings_from_definitions() {
        let (character, reading) = parse_hanja_line("學=배울, 학,learn,study").unwrap();
        assert_eq!(character, '學');
        assert_eq!(reading.korean, "배울, 학");
        assert_eq!(reading.meaning, "learn, study");
        assert!(parse_hanja_line("[학]").is_none());
        assert!(parse_hanja_line("no equals sign").is_none());
    }

    #[test]
    fn homonyms_keep_file_order() {
        let dict = dictionary();
        let entries = dict.words_by_korean("학교");
        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 5]);
        assert!(dict.words_by_korean("없는말").is_empty());
    }

    #[test]
    fn meanings_follow_spelling_order() {
        let dict = dictionary();
        let meanings = dict.hanja_meanings_for_word("학교").unwrap();
        let chars: Vec<char> = meanings.iter().map(|m| m.character).collect();
        assert_eq!(chars, vec!['學', '校']);
        assert_eq!(meanings[0].readings[0].meaning, "learn, study");
    }

    #[test]
    fn meanings_absent_without_hanja() {
        let dict = dictionary();
        assert!(dict.hanja_meanings_for_word("혼자").is_none());
        assert!(dict.hanja_meanings_for_word("없는말").is_none());
    }

    #[test]
    fn meanings_skip_unknown_characters() {
        let dict = dictionary();
        let meanings = dict.hanja_meanings_for_word("과학").unwrap();
        assert_eq!(
            meanings.iter().map(|m| m.character).collect::<Vec<_>>(),
            vec!['學']
        );
    }

    #[test]
    fn related_words_exclude_original() {
        let dict = dictionary();
        let related = dict.related_words("學", Some("학교"), 10);
        let words: Vec<&str> = related.iter().map(|r| r.word.as_str()).collect();
        assert_eq!(words, vec!["학생", "대학", "과학"]);
        assert_eq!(related[2].lemma, "");
        assert_eq!(dict.related_words("學", None, 2).len(), 2);
        assert!(dict.related_words("", None, 10).is_empty());
    }

    #[test]
    fn missing_column_is_reported() {
        let err = Dictionary::from_readers("id\tsurface\tgloss\n".as_bytes(), "".as_bytes())
            .unwrap_err();
        assert!(matches!(err, DictionaryError::MissingColumn("hanja")));
    }

    #[test]
    fn invalid_id_is_reported() {
        let err = Dictionary::from_readers(
            "id\tsurface\thanja\tgloss\nx\t학교\t學校\tschool\n".as_bytes(),
            "".as_bytes(),
        )
        .unwrap_err();
        assert!(matches!(err, DictionaryError::InvalidId { line: 2, .. }));
    }

    #[tokio::test]
    async fn cached_source_hits_inner_once() {
        use crate::loader::testing::{ScriptedSource, word};
        let inner = ScriptedSource::returning(vec![word("학생", "學生", "student")]);
        let cached = CachedSource::new(inner, 4);
        let query = RelatedQuery::new("學", Some("학교".to_string()));
        cached.fetch(&query).await.unwrap();
        let again = cached.fetch(&query).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(cached.inner().call_count(), 1);
    }

    #[tokio::test]
    async fn dictionary_source_applies_limit() {
        let source = DictionarySource::new(Arc::new(dictionary()), 1);
        let words = source
            .fetch(&RelatedQuery::new("學", Some("학교".to_string())))
            .await
            .unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "학생");
        let none = source
            .fetch(&RelatedQuery::new("生", Some("학생".to_string())))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
