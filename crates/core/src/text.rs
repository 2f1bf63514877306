//! Term normalization for catalog matching
//!
//! Everything here is pure and total: any input, including empty or
//! punctuation-only text, yields a (possibly empty) token sequence.
//!
//! - `fold` lowercases and strips diacritics (NFD, combining marks dropped)
//! - `normalize` splits on non-letters and drops short tokens and stop words
//! - `sku_tokens` keeps identifier-shaped chunks for SKU lookups
//! - `stem` collapses Spanish plural inflection for comparisons

use std::collections::BTreeSet;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::MatchingConfig;

pub const MIN_TOKEN_CHARS: usize = 3;

/// Articles and prepositions that never carry product meaning.
pub const STOP_WORDS: &[&str] =
    &["el", "la", "los", "las", "con", "para", "por", "del", "una", "uno"];

/// Conversational words that survive the stop-word filter but never name a
/// product: request verbs, price/stock questions, greetings.
pub const FILLER_WORDS: &[&str] = &[
    "tienen", "tienes", "tiene", "tenes", "tendran", "tendras", "hay", "precio", "precios",
    "cuanto", "cuantos", "cuanta", "cuantas", "cuesta", "cuestan", "costo", "valor", "vale",
    "valen", "stock", "disponible", "disponibles", "disponibilidad", "esta", "estan", "color",
    "colores", "talla", "tallas", "caracteristica", "caracteristicas", "que", "cual", "cuales",
    "como", "donde", "quiero", "quisiera", "necesito", "busco", "buscando", "comprar", "venden",
    "vendes", "sku", "codigo", "info", "informacion", "sobre", "algun", "alguna", "algunos",
    "algunas", "tambien", "favor", "hola", "gracias", "viene", "vienen", "unidades", "cantidad",
    "mostrar", "muestrame", "dame", "puedes", "pueden", "podrias", "saber", "ver", "tal", "mas",
    "otro", "otra", "otros", "otras", "este", "estos", "estas", "ese", "esa", "eso", "esos",
    "esas", "entonces", "bueno", "ok", "okay", "modelo", "modelos", "tamano", "tamanos",
    "variante", "variantes", "opcion", "opciones", "material", "materiales", "capacidad",
    "dimension", "dimensiones", "medida", "medidas", "incluye", "incluyen", "hecho", "hechos",
    "hecha", "hechas", "detalle", "detalles", "cuentame", "cuentenme", "siguiente", "unitario",
    "unitaria", "producto", "productos", "catalogo", "ayuda", "buenos", "buenas", "dias",
    "tardes", "noches", "hacer", "servicio", "servicios", "ofrecen", "ofreces",
];

/// Qualifying words accepted next to a product noun without naming a
/// different product: colors, materials, sizes.
pub const MODIFIER_WORDS: &[&str] = &[
    "rojo", "roja", "azul", "verde", "negro", "negra", "blanco", "blanca", "amarillo",
    "amarilla", "gris", "rosado", "rosada", "morado", "morada", "naranja", "cafe", "celeste",
    "dorado", "dorada", "plateado", "plateada", "grande", "pequeno", "pequena", "mediano",
    "mediana", "chico", "chica", "mini", "metal", "madera", "plastico", "cuero", "tela",
    "algodon", "acero", "aluminio", "vidrio", "ceramica", "bambu", "silicona", "nuevo", "nueva",
    "barato", "barata", "bonito", "bonita", "personalizado", "personalizada", "estampado",
    "estampada", "metalizado", "metalizada", "acolchado", "acolchada", "infantil", "escolar",
    "especial", "original", "natural", "digital", "casual", "formal", "liso", "lisa", "mate",
    "brillante", "reforzado", "reforzada",
];

/// Adjective endings (after stemming) treated as modifiers. Endings shared
/// with common nouns (`candado`, `vestido`, `collar`, `delantal`) are left
/// to the explicit word list.
const MODIFIER_SUFFIXES: &[&str] = &["ico", "ica", "oso", "osa", "ble"];

/// Lowercase and strip diacritics. `ñ` folds to `n`.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|character| !is_combining_mark(*character))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Tokenize with the built-in stop words only.
pub fn normalize(raw: &str) -> Vec<String> {
    tokenize(raw, |token| STOP_WORDS.contains(&token))
}

/// Canonical form of a SKU used as index key. Empty input stays empty.
pub fn normalize_sku(sku: &str) -> String {
    fold(sku.trim())
}

/// Identifier-shaped chunks of a query, for SKU lookup.
///
/// Each whitespace chunk is emitted with outer punctuation trimmed (so `K-78`
/// and `sku:b85` survive), followed by its alphanumeric runs. No length
/// filtering: SKUs may be short.
pub fn sku_tokens(raw: &str) -> Vec<String> {
    let folded = fold(raw);
    let mut tokens = Vec::new();

    for chunk in folded.split_whitespace() {
        let trimmed = chunk.trim_matches(|character: char| !character.is_alphanumeric());
        push_unique(&mut tokens, trimmed);
        for run in trimmed.split(|character: char| !character.is_alphanumeric()) {
            push_unique(&mut tokens, run);
        }
    }

    tokens
}

/// Whether a SKU token looks like a product code rather than a word or a bare
/// quantity ("b85", "12345", but not "2").
pub fn looks_like_identifier(token: &str) -> bool {
    let has_digit = token.chars().any(|character| character.is_ascii_digit());
    let has_letter = token.chars().any(char::is_alphabetic);
    has_digit && (has_letter || token.chars().count() >= MIN_TOKEN_CHARS)
}

/// Collapse plural inflection: `tazones` → `tazon`, `mochilas` → `mochila`.
pub fn stem(token: &str) -> String {
    let characters: Vec<char> = token.chars().collect();
    let length = characters.len();

    if length > 4
        && token.ends_with("es")
        && matches!(characters[length - 3], 'l' | 'n' | 'r' | 'd' | 'j')
    {
        return characters[..length - 2].iter().collect();
    }

    if length > MIN_TOKEN_CHARS && token.ends_with('s') && !token.ends_with("ss") {
        return characters[..length - 1].iter().collect();
    }

    token.to_string()
}

fn tokenize(raw: &str, is_stop_word: impl Fn(&str) -> bool) -> Vec<String> {
    fold(raw)
        .split(|character: char| !character.is_alphabetic())
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

fn push_unique(tokens: &mut Vec<String>, candidate: &str) {
    if !candidate.is_empty() && !tokens.iter().any(|token| token == candidate) {
        tokens.push(candidate.to_string());
    }
}

/// Word lists used while tokenizing queries and product names.
///
/// Built-in lists are always present; configuration can only add to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vocabulary {
    stop_words: BTreeSet<String>,
    filler_words: BTreeSet<String>,
    modifier_stems: BTreeSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::with_extras(&[], &[], &[])
    }
}

impl Vocabulary {
    pub fn with_extras(
        extra_stop_words: &[String],
        extra_filler_words: &[String],
        extra_modifiers: &[String],
    ) -> Self {
        let stop_words = STOP_WORDS
            .iter()
            .map(|word| word.to_string())
            .chain(extra_stop_words.iter().map(|word| fold(word.trim())))
            .filter(|word| !word.is_empty())
            .collect();
        let filler_words = FILLER_WORDS
            .iter()
            .map(|word| word.to_string())
            .chain(extra_filler_words.iter().map(|word| fold(word.trim())))
            .filter(|word| !word.is_empty())
            .collect();
        let modifier_stems = MODIFIER_WORDS
            .iter()
            .map(|word| stem(word))
            .chain(extra_modifiers.iter().map(|word| stem(&fold(word.trim()))))
            .filter(|word| !word.is_empty())
            .collect();

        Self { stop_words, filler_words, modifier_stems }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::with_extras(
            &config.extra_stop_words,
            &config.extra_filler_words,
            &config.modifiers,
        )
    }

    pub fn normalize(&self, raw: &str) -> Vec<String> {
        tokenize(raw, |token| self.stop_words.contains(token))
    }

    /// Drop conversational filler, keeping the words that may name a product.
    pub fn subject_terms(&self, tokens: &[String]) -> Vec<String> {
        tokens.iter().filter(|token| !self.filler_words.contains(token.as_str())).cloned().collect()
    }

    pub fn is_filler(&self, token: &str) -> bool {
        self.filler_words.contains(token)
    }

    /// Modifier test on a stemmed term. Callers must rule out category nouns
    /// first; a known product type is never a modifier.
    pub fn is_modifier_stem(&self, term_stem: &str) -> bool {
        self.modifier_stems.contains(term_stem)
            || MODIFIER_SUFFIXES.iter().any(|suffix| {
                term_stem.ends_with(suffix)
                    && term_stem.chars().count() > suffix.chars().count() + 2
            })
    }
}
