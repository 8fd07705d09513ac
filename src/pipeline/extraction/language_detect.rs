//! Lightweight language detection for extracted text.
//!
//! Scores each supported language by stop-word frequency plus a small bonus
//! for characteristic diacritics, then keeps every language that carries a
//! meaningful share of the text. Mixed-language documents therefore report
//! more than one code, most prominent first.
//!
//! Codes are ISO 639-1, the same codes the vision model reports.

/// Minimum stop-word hits before a language is reported at all.
const MIN_HITS: u32 = 2;

/// A language is kept when it scores at least 1/KEEP_RATIO of the leader.
const KEEP_RATIO: u32 = 4;

/// Below this many words the text is too short to call.
const MIN_WORDS: usize = 3;

struct LanguageProfile {
    code: &'static str,
    stop_words: &'static [&'static str],
    diacritics: &'static [char],
}

const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        code: "en",
        stop_words: &[
            "the", "and", "of", "to", "is", "was", "for", "are", "with", "this", "that", "from",
            "have", "they", "will", "which", "been", "your", "our", "has", "would", "there",
            "their", "not", "you", "but", "please",
        ],
        diacritics: &[],
    },
    LanguageProfile {
        code: "de",
        stop_words: &[
            "der", "die", "das", "und", "ist", "nicht", "mit", "von", "den", "dem", "des", "ein",
            "eine", "einer", "zu", "auf", "für", "sich", "auch", "wir", "ihr", "sie", "bei",
            "wird", "werden", "oder", "aus", "nach", "wie", "über", "sehr", "bitte", "ihre", "im",
        ],
        diacritics: &['ä', 'ö', 'ü', 'ß'],
    },
    LanguageProfile {
        code: "fr",
        stop_words: &[
            "le", "la", "les", "et", "est", "des", "du", "une", "pour", "dans", "avec", "qui",
            "que", "pas", "sur", "au", "aux", "ce", "cette", "sont", "nous", "vous", "mais",
            "par", "été", "ou", "votre",
        ],
        diacritics: &['é', 'è', 'ê', 'ë', 'ç', 'à', 'ù', 'œ'],
    },
    LanguageProfile {
        code: "es",
        stop_words: &[
            "el", "los", "las", "del", "por", "con", "para", "una", "como", "pero", "sus",
            "esta", "este", "muy", "también", "y", "su", "usted", "hay", "fue",
        ],
        diacritics: &['ñ', '¿', '¡', 'á', 'í', 'ó', 'ú'],
    },
    LanguageProfile {
        code: "it",
        stop_words: &[
            "il", "di", "che", "della", "delle", "degli", "gli", "per", "sono", "non", "è",
            "nel", "alla", "anche", "più", "questo", "questa", "essere", "suo", "vostro",
        ],
        diacritics: &['ì', 'ò'],
    },
    LanguageProfile {
        code: "pt",
        stop_words: &[
            "o", "os", "do", "da", "dos", "das", "em", "não", "um", "uma", "com", "são",
            "também", "mais", "você", "seu", "sua", "pelo", "pela", "foi",
        ],
        diacritics: &['ã', 'õ'],
    },
    LanguageProfile {
        code: "nl",
        stop_words: &[
            "het", "een", "van", "niet", "dat", "op", "te", "zijn", "met", "voor", "wij", "uw",
            "ook", "aan", "bij", "naar", "en", "worden", "deze", "wordt",
        ],
        diacritics: &['ĳ'],
    },
    LanguageProfile {
        code: "ru",
        stop_words: &[
            "что", "это", "как", "был", "была", "было", "быть", "также", "его", "она", "они",
            "для", "вы", "мы", "из", "к", "у", "но", "же", "уже", "который", "которые", "очень",
        ],
        diacritics: &['ы', 'э', 'ё'],
    },
    LanguageProfile {
        code: "bg",
        stop_words: &[
            "се", "да", "е", "са", "че", "като", "това", "към", "които", "който", "която",
            "тази", "беше", "ще", "във", "със", "най", "нас", "вие",
        ],
        diacritics: &['ъ'],
    },
    LanguageProfile {
        code: "ro",
        stop_words: &[
            "și", "şi", "în", "este", "sunt", "cu", "pe", "din", "care", "pentru", "nu", "mai",
            "fost", "acest", "această", "către", "sau", "vă", "prin", "ale", "unei", "unui",
        ],
        diacritics: &['ă', 'ș', 'ş', 'ț', 'ţ'],
    },
];

/// One detected language with its raw score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLanguage {
    pub code: &'static str,
    pub score: u32,
}

/// Rank the languages present in `text`, most prominent first.
///
/// Returns an empty list when the text is too short or no language
/// reaches the minimum number of hits.
pub fn detect_languages(text: &str) -> Vec<DetectedLanguage> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    if words.len() < MIN_WORDS {
        return Vec::new();
    }

    let mut scored: Vec<DetectedLanguage> = PROFILES
        .iter()
        .map(|profile| {
            let hits = words
                .iter()
                .filter(|w| profile.stop_words.contains(w))
                .count() as u32;
            DetectedLanguage {
                code: profile.code,
                score: hits + diacritic_bonus(&lower, profile.diacritics),
            }
        })
        .filter(|d| d.score >= MIN_HITS)
        .collect();

    // Stable sort keeps profile order on ties.
    scored.sort_by(|a, b| b.score.cmp(&a.score));

    let top = match scored.first() {
        Some(first) => first.score,
        None => return Vec::new(),
    };
    scored.retain(|d| d.score * KEEP_RATIO >= top);
    scored
}

/// Ranked ISO 639-1 codes only.
pub fn detect_language_codes(text: &str) -> Vec<String> {
    detect_languages(text)
        .into_iter()
        .map(|d| d.code.to_string())
        .collect()
}

/// Merge `incoming` into `acc`, keeping first-seen order and no repeats.
pub fn union_languages(acc: &mut Vec<String>, incoming: &[String]) {
    for code in incoming {
        let code = normalize_code(code);
        if !code.is_empty() && !acc.contains(&code) {
            acc.push(code);
        }
    }
}

/// `EN`, ` en ` → `en`.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Every 2 characteristic characters = 1 point.
fn diacritic_bonus(lower_text: &str, diacritics: &[char]) -> u32 {
    if diacritics.is_empty() {
        return 0;
    }
    let count = lower_text.chars().filter(|c| diacritics.contains(c)).count() as u32;
    count / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGLISH: &str = "This is the invoice for the electricity that was used in the \
        apartment. Please pay the amount within thirty days, and keep this letter for your records.";

    const GERMAN: &str = "Dies ist die Rechnung für den Stromverbrauch in der Wohnung. Bitte \
        zahlen Sie den Betrag innerhalb von dreißig Tagen und bewahren Sie dieses Schreiben auf.";

    #[test]
    fn detects_english() {
        let codes = detect_language_codes(ENGLISH);
        assert_eq!(codes, vec!["en"]);
    }

    #[test]
    fn detects_german() {
        let codes = detect_language_codes(GERMAN);
        assert_eq!(codes.first().map(String::as_str), Some("de"));
        assert!(!codes.contains(&"en".to_string()));
    }

    #[test]
    fn mixed_document_reports_both() {
        let text = format!("{ENGLISH}\n\n{GERMAN}");
        let codes = detect_language_codes(&text);
        assert!(codes.contains(&"en".to_string()), "{codes:?}");
        assert!(codes.contains(&"de".to_string()), "{codes:?}");
    }

    #[test]
    fn separates_russian_from_bulgarian() {
        let russian = "Это счёт за электроэнергию, который был выставлен для вашей квартиры. \
            Мы просим вас оплатить его до конца месяца, что очень важно.";
        let bulgarian = "Това е сметката за електроенергия, която беше издадена за вашия \
            апартамент. Моля да платите сумата, че това е важно и ще се провери към края на месеца.";

        assert_eq!(detect_language_codes(russian).first().map(String::as_str), Some("ru"));
        assert_eq!(detect_language_codes(bulgarian).first().map(String::as_str), Some("bg"));
    }

    #[test]
    fn short_text_yields_nothing() {
        assert!(detect_languages("Invoice 42").is_empty());
        assert!(detect_languages("").is_empty());
    }

    #[test]
    fn numbers_only_yield_nothing() {
        assert!(detect_languages("2023 114 120,00 19% 4711 0815").is_empty());
    }

    #[test]
    fn scores_are_descending() {
        let text = format!("{GERMAN} {GERMAN} {ENGLISH}");
        let detected = detect_languages(&text);
        assert!(detected.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(detected[0].code, "de");
    }

    #[test]
    fn union_preserves_first_seen_order() {
        let mut acc = vec!["de".to_string()];
        union_languages(&mut acc, &["EN".to_string(), "de".to_string(), " en".to_string()]);
        union_languages(&mut acc, &["fr".to_string(), "".to_string()]);
        assert_eq!(acc, vec!["de", "en", "fr"]);
    }
}
