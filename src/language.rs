//! Spanish/English language classification and response templates.
//!
//! [`LanguageClassifier::detect_language`] combines three signals:
//!
//! | Signal | Weight |
//! |--------|--------|
//! | `¿` or `¡` present | short-circuits to Spanish |
//! | any interrogative of a language appears as a substring | +2 |
//! | each common marker word present as a whole token | +1 |
//! | statistical detector agrees with a language | +3 |
//!
//! Spanish wins only on a strictly higher score; ties go to English.
//!
//! The statistical signal is best-effort: a detector failure contributes
//! nothing to either score.

use anyhow::{bail, Result};
use tracing::debug;

use crate::models::Language;

const SPANISH_PUNCTUATION: [char; 2] = ['¿', '¡'];

const ES_QUESTION_WORDS: &[&str] = &[
    "qué", "cuál", "cómo", "dónde", "quién", "cuándo", "cuánto", "por qué",
];
const ES_MARKERS: &[&str] = &[
    "el", "la", "los", "las", "es", "son", "está", "tienen", "tiene",
];

const EN_QUESTION_WORDS: &[&str] = &["what", "which", "how", "where", "who", "when", "why", "whose"];
const EN_MARKERS: &[&str] = &["the", "is", "are", "has", "have", "does", "do"];

/// Statistical language identification, consulted as a tie-breaker signal.
///
/// Returns an ISO 639-1 code. Implementations may fail on short or
/// featureless input; callers treat failure as "no opinion".
pub trait StatisticalDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<String>;
}

/// Stopword-frequency detector for Spanish and English.
///
/// Counts tokens that belong to each language's most frequent function
/// words and reports the language with the larger share. Fails when the
/// text has no such tokens or both languages score equally. The word lists
/// share nothing with the interrogatives or marker words, so this vote
/// never re-counts a lexical hit.
pub struct StopwordDetector;

const ES_STOPWORDS: &[&str] = &[
    "de", "que", "en", "y", "a", "se", "del", "un", "con", "no", "una", "su", "para", "al", "lo",
    "como", "más", "pero", "sus", "le", "ya", "o", "este", "sí", "porque", "esta", "entre",
    "cuando", "muy", "sin", "sobre", "también", "me", "hasta", "hay", "donde", "quien", "desde",
    "todo", "nos", "durante", "fue", "ha", "han", "sido", "cada", "otros", "experiencia", "años",
];

const EN_STOPWORDS: &[&str] = &[
    "of", "and", "to", "in", "you", "that", "it", "he", "was", "for", "on", "as", "with", "his",
    "they", "at", "be", "this", "from", "or", "had", "by", "but", "some", "we", "can", "out",
    "other", "were", "all", "there", "your", "said", "an", "each", "she", "their", "did", "been",
    "would", "into", "about", "these", "its", "more", "will", "experience", "years",
];

impl StatisticalDetector for StopwordDetector {
    fn detect(&self, text: &str) -> Result<String> {
        let lower = text.to_lowercase();
        let tokens = tokenize(&lower);
        if tokens.is_empty() {
            bail!("No features in text");
        }

        let es = tokens.iter().filter(|t| ES_STOPWORDS.contains(t)).count();
        let en = tokens.iter().filter(|t| EN_STOPWORDS.contains(t)).count();

        match es.cmp(&en) {
            std::cmp::Ordering::Greater => Ok("es".to_string()),
            std::cmp::Ordering::Less => Ok("en".to_string()),
            std::cmp::Ordering::Equal => bail!("Ambiguous language profile"),
        }
    }
}

/// Bilingual language classifier.
pub struct LanguageClassifier {
    statistical: Option<Box<dyn StatisticalDetector>>,
}

impl Default for LanguageClassifier {
    fn default() -> Self {
        Self::new(Some(Box::new(StopwordDetector)))
    }
}

impl LanguageClassifier {
    pub fn new(statistical: Option<Box<dyn StatisticalDetector>>) -> Self {
        Self { statistical }
    }

    /// Classifier using only the lexical signals.
    pub fn lexical_only() -> Self {
        Self::new(None)
    }

    pub fn detect_language(&self, text: &str) -> Language {
        if text.contains(SPANISH_PUNCTUATION) {
            return Language::Es;
        }

        let lower = text.trim().to_lowercase();
        let tokens = tokenize(&lower);

        let mut es = lexical_score(&lower, &tokens, ES_QUESTION_WORDS, ES_MARKERS);
        let mut en = lexical_score(&lower, &tokens, EN_QUESTION_WORDS, EN_MARKERS);

        if let Some(detector) = &self.statistical {
            match detector.detect(&lower) {
                Ok(code) => match Language::from_code(&code) {
                    Some(Language::Es) => es += 3,
                    Some(Language::En) => en += 3,
                    None => {}
                },
                Err(e) => debug!("Statistical language detection gave no answer: {}", e),
            }
        }

        debug!(es, en, "Language scores");
        if es > en {
            Language::Es
        } else {
            Language::En
        }
    }
}

fn lexical_score(lower: &str, tokens: &[&str], questions: &[&str], markers: &[&str]) -> u32 {
    let mut score = 0;
    if questions.iter().any(|q| lower.contains(q)) {
        score += 2;
    }
    score += markers.iter().filter(|m| tokens.contains(m)).count() as u32;
    score
}

/// Split on anything that is not a letter or digit.
fn tokenize(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

// ============ Templates ============

/// A prompt template and the matching "CV missing" message.
///
/// Placeholders: `{name}` (named templates only), `{context}`, `{query}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseTemplate {
    pub template: &'static str,
    pub error_message: &'static str,
}

const DEFAULT_ES: ResponseTemplate = ResponseTemplate {
    template: "Eres un asistente experto analizando el CV del candidato principal.

El CV contiene la siguiente información:
{context}

Pregunta: {query}

Proporciona una respuesta detallada y objetiva en español, basada en el CV.
Evita usar primera persona. Refiérete al candidato en tercera persona.",
    error_message: "No se encontró el CV del candidato principal.",
};

const DEFAULT_EN: ResponseTemplate = ResponseTemplate {
    template: "You are an expert assistant analyzing the primary candidate's CV.

The CV contains the following information:
{context}

Question: {query}

Please provide a detailed and objective response in English based on the CV.
Avoid using first person. Refer to the candidate in third person.",
    error_message: "The primary candidate's CV was not found.",
};

const NAMED_ES: ResponseTemplate = ResponseTemplate {
    template: "Eres un asistente experto analizando el CV de {name}.

El CV contiene la siguiente información:
{context}

Pregunta: {query}

Proporciona una respuesta detallada y objetiva en español, basada en el CV.
Menciona ejemplos específicos cuando sea relevante.",
    error_message: "CV no encontrado.",
};

const NAMED_EN: ResponseTemplate = ResponseTemplate {
    template: "You are an expert assistant analyzing {name}'s CV.

The CV contains the following information:
{context}

Question: {query}

Please provide a detailed and objective response in English based on the CV.
Mention specific examples when relevant.",
    error_message: "CV not found.",
};

/// Select a template by language code. Unknown codes use English.
pub fn get_response_template(lang: &str, is_default_entity: bool) -> ResponseTemplate {
    match (Language::from_code(lang), is_default_entity) {
        (Some(Language::Es), true) => DEFAULT_ES,
        (Some(Language::Es), false) => NAMED_ES,
        (_, true) => DEFAULT_EN,
        (_, false) => NAMED_EN,
    }
}

/// Fill a template's placeholders in one left-to-right pass.
///
/// Only placeholders in `template` itself are substituted; braces inside
/// the inserted name, context or query are copied verbatim. `{name}` is
/// left as is when `name` is `None`.
pub fn render_template(template: &str, name: Option<&str>, context: &str, query: &str) -> String {
    let values = [("{context}", Some(context)), ("{query}", Some(query)), ("{name}", name)];
    let mut out = String::with_capacity(template.len() + context.len() + query.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match values
            .iter()
            .find(|(placeholder, value)| value.is_some() && tail.starts_with(placeholder))
        {
            Some((placeholder, Some(value))) => {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ============ User-facing messages ============

/// Fixed user-facing messages, localized per query language.
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    lang: Language,
}

impl Messages {
    pub fn for_language(lang: Language) -> Self {
        Self { lang }
    }

    pub fn no_default(&self) -> String {
        match self.lang {
            Language::Es => "No se mencionó a ninguna persona y no hay un CV predeterminado configurado.".to_string(),
            Language::En => "No person was mentioned and no default CV is configured.".to_string(),
        }
    }

    pub fn cv_not_found(&self, name: &str) -> String {
        match self.lang {
            Language::Es => format!("No se encontró el CV de {}.", name),
            Language::En => format!("CV not found for {}.", name),
        }
    }

    pub fn no_cvs_found(&self) -> String {
        match self.lang {
            Language::Es => "No se encontraron los CVs de los nombres mencionados.".to_string(),
            Language::En => "No CVs found for the mentioned names.".to_string(),
        }
    }

    pub fn processing_error(&self, err: &dyn std::fmt::Display) -> String {
        match self.lang {
            Language::Es => format!("Error procesando la consulta: {}", err),
            Language::En => format!("Error processing the query: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl StatisticalDetector for Fixed {
        fn detect(&self, _text: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl StatisticalDetector for Failing {
        fn detect(&self, _text: &str) -> Result<String> {
            bail!("detector unavailable")
        }
    }

    #[test]
    fn test_spanish_punctuation_short_circuits() {
        let c = LanguageClassifier::new(Some(Box::new(Fixed("en"))));
        assert_eq!(c.detect_language("¿What is the experience?"), Language::Es);
        assert_eq!(c.detect_language("Wow¡ the team is great"), Language::Es);
    }

    #[test]
    fn test_english_question() {
        let c = LanguageClassifier::default();
        assert_eq!(
            c.detect_language("What is John's experience with the cloud?"),
            Language::En
        );
    }

    #[test]
    fn test_spanish_without_punctuation() {
        let c = LanguageClassifier::default();
        assert_eq!(
            c.detect_language("Cuál es la experiencia de Ana en los proyectos"),
            Language::Es
        );
    }

    #[test]
    fn test_markers_are_whole_tokens() {
        let c = LanguageClassifier::lexical_only();
        // "la" inside "class" or "el" inside "elastic" must not count
        assert_eq!(c.detect_language("elastic classes"), Language::En);
    }

    #[test]
    fn test_tie_favors_english() {
        let c = LanguageClassifier::lexical_only();
        assert_eq!(c.detect_language("Rust Go Kubernetes"), Language::En);
        // one marker each: "es" and "is"
        assert_eq!(c.detect_language("es is"), Language::En);
    }

    #[test]
    fn test_statistical_vote_adds_three() {
        let c = LanguageClassifier::new(Some(Box::new(Fixed("es"))));
        // English lexical score: "is" + "the" = 2; Spanish gets 3 from the detector
        assert_eq!(c.detect_language("Python is the main skill"), Language::Es);
        let c = LanguageClassifier::new(Some(Box::new(Fixed("fr"))));
        assert_eq!(c.detect_language("Python is the main skill"), Language::En);
    }

    #[test]
    fn test_detector_failure_is_ignored() {
        let c = LanguageClassifier::new(Some(Box::new(Failing)));
        assert_eq!(c.detect_language("dónde trabaja"), Language::Es);
        assert_eq!(c.detect_language(""), Language::En);
    }

    #[test]
    fn test_stopword_detector() {
        let d = StopwordDetector;
        assert_eq!(d.detect("la experiencia de los equipos").unwrap(), "es");
        assert_eq!(d.detect("the experience of the team").unwrap(), "en");
        assert!(d.detect("!!!").is_err());
        assert!(d.detect("Kubernetes").is_err());
    }

    #[test]
    fn test_template_selection() {
        assert!(get_response_template("es", true).template.contains("en español"));
        assert!(get_response_template("es", false).template.contains("{name}"));
        assert!(!get_response_template("en", true).template.contains("{name}"));
        assert_eq!(get_response_template("de", false), get_response_template("en", false));
        assert_eq!(get_response_template("pt", true), get_response_template("en", true));
    }

    #[test]
    fn test_render_template() {
        let t = get_response_template("en", false);
        let out = render_template(t.template, Some("Ana García"), "- Rust", "Skills?");
        assert!(out.contains("Ana García's CV"));
        assert!(out.contains("- Rust"));
        assert!(out.contains("Question: Skills?"));
        assert!(!out.contains('{'));
    }

    #[test]
    fn test_render_does_not_touch_inserted_text() {
        let t = get_response_template("en", false);
        let out = render_template(
            t.template,
            Some("Ana"),
            "- Wrote a {query} builder",
            "Does {name} know {context}?",
        );
        assert!(out.contains("analyzing Ana's CV"));
        assert!(out.contains("- Wrote a {query} builder"));
        assert!(out.contains("Question: Does {name} know {context}?"));
    }

    #[test]
    fn test_render_without_name_keeps_placeholder() {
        let out = render_template("{name}: {query}", None, "", "q");
        assert_eq!(out, "{name}: q");
    }

    #[test]
    fn test_stopwords_are_independent_of_lexical_lists() {
        for (stopwords, questions, markers) in [
            (ES_STOPWORDS, ES_QUESTION_WORDS, ES_MARKERS),
            (EN_STOPWORDS, EN_QUESTION_WORDS, EN_MARKERS),
        ] {
            for word in stopwords {
                assert!(!markers.contains(word), "{} is also a marker", word);
                assert!(
                    !questions.iter().flat_map(|q| q.split(' ')).any(|q| q == *word),
                    "{} is also an interrogative",
                    word
                );
            }
        }
    }

    #[test]
    fn test_messages_localized() {
        let en = Messages::for_language(Language::En);
        let es = Messages::for_language(Language::Es);
        assert_eq!(en.cv_not_found("carlos"), "CV not found for carlos.");
        assert!(es.cv_not_found("carlos").starts_with("No se encontró"));
        assert!(en.processing_error(&"boom").ends_with("boom"));
    }
}
