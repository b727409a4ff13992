pub mod translator;

pub use translator::GoogleTranslator;

pub const DEFAULT_API_URL: &str = "https://translation.googleapis.com/language/translate/v2";
