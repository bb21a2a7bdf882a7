use scout_core::error::AppError;
use scout_core::traits::LanguageDetector;

/// Language detector backed by `whatlang`, reporting ISO 639-1 codes where
/// one exists (ISO 639-3 otherwise).
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::LanguageDetection("no text to classify".into()));
        }
        let info = whatlang::detect(text)
            .ok_or_else(|| AppError::LanguageDetection("no language features found".into()))?;
        let code = info.lang().code();
        Ok(to_iso639_1(code).unwrap_or(code).to_string())
    }
}

fn to_iso639_1(code: &str) -> Option<&'static str> {
    let short = match code {
        "eng" => "en",
        "spa" => "es",
        "fra" => "fr",
        "deu" => "de",
        "ita" => "it",
        "por" => "pt",
        "nld" => "nl",
        "rus" => "ru",
        "ukr" => "uk",
        "pol" => "pl",
        "ces" => "cs",
        "slk" => "sk",
        "swe" => "sv",
        "dan" => "da",
        "nob" => "no",
        "fin" => "fi",
        "est" => "et",
        "lav" => "lv",
        "lit" => "lt",
        "hun" => "hu",
        "ron" => "ro",
        "bul" => "bg",
        "hrv" => "hr",
        "srp" => "sr",
        "slv" => "sl",
        "ell" => "el",
        "tur" => "tr",
        "ara" => "ar",
        "heb" => "he",
        "pes" => "fa",
        "hin" => "hi",
        "ben" => "bn",
        "urd" => "ur",
        "tam" => "ta",
        "tel" => "te",
        "cmn" => "zh",
        "jpn" => "ja",
        "kor" => "ko",
        "vie" => "vi",
        "tha" => "th",
        "ind" => "id",
        "tgl" => "tl",
        "afr" => "af",
        "cat" => "ca",
        _ => return None,
    };
    Some(short)
}
