use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A related word as returned by `/related-words`.
///
/// Values come from the server and are treated as untrusted markup input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedWord {
    pub word: String,
    pub hanja: String,
    pub lemma: String,
}

/// Whether record fields are HTML-escaped before insertion.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Escaping {
    #[default]
    Escaped,
    /// Inserts server values untouched. Only kept for parity with the legacy panel.
    Raw,
}

impl Escaping {
    fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            Escaping::Escaped => Cow::Owned(html_escape(value)),
            Escaping::Raw => Cow::Borrowed(value),
        }
    }
}

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Renders one search form posting the related word back to `/search`.
pub fn render_related_word(record: &RelatedWord, escaping: Escaping) -> String {
    let word = escaping.apply(&record.word);
    let hanja = escaping.apply(&record.hanja);
    let lemma = escaping.apply(&record.lemma);
    format!(
        r#"<form action="/search" method="POST" class="related-word-form"><input type="hidden" name="word" value="{word}"><button type="submit" class="related-word-button"><strong>{word}</strong> ({hanja}) : {lemma}</button></form>"#
    )
}

/// Renders every record in the order given.
pub fn render_related_words(records: &[RelatedWord], escaping: Escaping) -> String {
    records
        .iter()
        .map(|record| render_related_word(record, escaping))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wraps a caller-provided message in a paragraph. The message is trusted and not escaped.
pub fn render_message(message: &str) -> String {
    format!("<p>{message}</p>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(word: &str, hanja: &str, lemma: &str) -> RelatedWord {
        RelatedWord {
            word: word.to_string(),
            hanja: hanja.to_string(),
            lemma: lemma.to_string(),
        }
    }

    #[test]
    fn escapes_all_five_characters() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(html_escape("학교 學校"), "학교 學校");
    }

    #[test]
    fn escaped_render_neutralizes_ampersand() {
        let html = render_related_word(&record("a&b", "甲", "x"), Escaping::Escaped);
        assert!(html.contains("<strong>a&amp;b</strong>"));
        assert!(html.contains(r#"value="a&amp;b""#));
        assert!(!html.contains("a&b"));
        assert!(html.contains("(甲) : x"));
    }

    #[test]
    fn raw_render_keeps_server_markup() {
        let html = render_related_word(&record("a&b", "甲", "x"), Escaping::Raw);
        assert!(html.contains("<strong>a&b</strong>"));
    }

    #[test]
    fn escaped_render_blocks_script_injection() {
        let html = render_related_word(
            &record("<script>alert(1)</script>", "\"><img>", "'"),
            Escaping::Escaped,
        );
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img>"));
        assert!(html.contains("&#39;</button>"));
    }

    #[test]
    fn render_keeps_response_order() {
        let records = vec![
            record("학생", "學生", "student"),
            record("학교", "學校", "school"),
            record("대학", "大學", "university"),
        ];
        let html = render_related_words(&records, Escaping::Escaped);
        let first = html.find("학생").unwrap();
        let second = html.find("학교").unwrap();
        let third = html.find("대학").unwrap();
        assert!(first < second && second < third);
        assert_eq!(html.matches("<form ").count(), 3);
    }

    #[test]
    fn message_is_inserted_verbatim() {
        assert_eq!(
            render_message("<em>관련 단어가 없습니다</em>"),
            "<p><em>관련 단어가 없습니다</em></p>"
        );
    }
}
