//! Line-oriented CV segmenter.
//!
//! Splits extracted CV text into [`Chunk`]s on heading boundaries, flushing
//! once the buffered lines reach a character threshold. Lines are never
//! split. Each chunk is then labelled with a [`Section`] and a
//! [`ContentType`] by scanning ordered bilingual keyword tables; the first
//! table entry with a substring hit wins.
//!
//! Segmentation is a pure function of its input.

use crate::models::{Chunk, ContentType, Section};

/// Character count at which the current buffer is emitted as a chunk.
pub const FLUSH_THRESHOLD: usize = 500;

/// Section keyword table. Order is significant: first match wins.
pub const SECTION_KEYWORDS: &[(Section, &[&str])] = &[
    (
        Section::Experience,
        &[
            "experiencia",
            "trabajo",
            "empleo",
            "trayectoria",
            "carrera",
            "laboral",
            "experience",
            "work",
            "employment",
            "career",
            "professional",
        ],
    ),
    (
        Section::Education,
        &[
            "educación",
            "formación",
            "estudios",
            "académico",
            "título",
            "education",
            "academic",
            "degree",
            "studies",
            "university",
        ],
    ),
    (
        Section::Skills,
        &[
            "habilidades",
            "tecnologías",
            "competencias",
            "conocimientos",
            "destrezas",
            "skills",
            "technologies",
            "competencies",
            "expertise",
            "proficiencies",
            "tech stack",
        ],
    ),
    (
        Section::Projects,
        &[
            "proyectos",
            "logros",
            "desarrollos",
            "projects",
            "achievements",
            "developments",
            "portfolio",
        ],
    ),
    (
        Section::Summary,
        &[
            "resumen",
            "perfil",
            "sobre mí",
            "acerca de",
            "summary",
            "profile",
            "about me",
            "overview",
            "professional summary",
        ],
    ),
];

/// Content-type keyword table. Order is significant: first match wins.
pub const CONTENT_TYPE_KEYWORDS: &[(ContentType, &[&str])] = &[
    (
        ContentType::Technologies,
        &[
            "python",
            "java",
            "javascript",
            "typescript",
            "react",
            "node",
            "angular",
            "vue",
            "django",
            "flask",
            "spring",
            "aws",
            "azure",
            "docker",
            "kubernetes",
            "programación",
            "programming",
            "desarrollo",
            "development",
            "código",
            "code",
            "software",
            "aplicación",
            "application",
            "api",
            "web",
            "móvil",
            "mobile",
        ],
    ),
    (
        ContentType::Education,
        &[
            "universidad",
            "título",
            "grado",
            "máster",
            "doctorado",
            "licenciatura",
            "ingeniería",
            "certificación",
            "university",
            "degree",
            "bachelor",
            "master",
            "phd",
            "certification",
            "engineering",
            "college",
            "school",
        ],
    ),
    (
        ContentType::Leadership,
        &[
            "lideré",
            "dirigí",
            "gestioné",
            "coordiné",
            "supervisé",
            "equipo",
            "gestión",
            "dirección",
            "led",
            "managed",
            "coordinated",
            "supervised",
            "team",
            "leadership",
            "management",
            "direction",
        ],
    ),
    (
        ContentType::Achievements,
        &[
            "logré",
            "conseguí",
            "implementé",
            "mejoré",
            "optimicé",
            "reduje",
            "aumenté",
            "desarrollé",
            "achieved",
            "implemented",
            "improved",
            "optimized",
            "reduced",
            "increased",
            "developed",
            "delivered",
        ],
    ),
];

/// Segment CV text using the default [`FLUSH_THRESHOLD`].
pub fn segment(raw_text: &str) -> Vec<Chunk> {
    segment_with_threshold(raw_text, FLUSH_THRESHOLD)
}

/// Segment CV text, flushing whenever buffered lines reach `flush_chars`.
///
/// Blank lines are skipped. A heading line (all uppercase, or ending in
/// `:`) closes the current buffer and starts the next one. Emitted chunk
/// text is the buffered lines, trimmed and joined with single spaces.
pub fn segment_with_threshold(raw_text: &str, flush_chars: usize) -> Vec<Chunk> {
    let mut texts: Vec<String> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffered_chars = 0usize;

    for line in raw_text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if is_heading(line) && !buffer.is_empty() {
            texts.push(buffer.join(" "));
            buffer.clear();
            buffered_chars = 0;
        }

        buffer.push(line.trim());
        buffered_chars += line.chars().count();

        if buffered_chars >= flush_chars {
            texts.push(buffer.join(" "));
            buffer.clear();
            buffered_chars = 0;
        }
    }

    if !buffer.is_empty() {
        texts.push(buffer.join(" "));
    }

    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            index,
            section: classify_section(&text),
            content_type: classify_content_type(&text),
            text,
        })
        .collect()
}

/// A heading is a line with at least one cased letter and no lowercase
/// letters, or a line ending in a colon.
pub fn is_heading(line: &str) -> bool {
    let has_upper = line.chars().any(|c| c.is_uppercase());
    let has_lower = line.chars().any(|c| c.is_lowercase());
    (has_upper && !has_lower) || line.ends_with(':')
}

pub fn classify_section(text: &str) -> Section {
    first_match(SECTION_KEYWORDS, text).unwrap_or(Section::General)
}

pub fn classify_content_type(text: &str) -> ContentType {
    first_match(CONTENT_TYPE_KEYWORDS, text).unwrap_or(ContentType::General)
}

/// Infer which content type a query is asking about.
///
/// Uses the same table as chunk classification; `None` when nothing matches.
pub fn infer_query_type(query: &str) -> Option<ContentType> {
    first_match(CONTENT_TYPE_KEYWORDS, query)
}

fn first_match<L: Copy>(table: &[(L, &[&str])], text: &str) -> Option<L> {
    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(label, _)| *label)
}
