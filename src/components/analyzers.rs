//! Built-in analyzers.

use tantivy::tokenizer::{
    Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer,
    WhitespaceTokenizer,
};

use super::{Analyzer, ComponentLoader};

/// Tokens longer than this are dropped.
const MAX_TOKEN_LEN: usize = 40;

pub(super) fn register_builtins(loader: &mut ComponentLoader) {
    loader
        .register_default_analyzer::<StandardAnalyzer>("standard")
        .register_default_analyzer::<WhitespaceAnalyzer>("whitespace")
        .register_default_analyzer::<RawAnalyzer>("raw")
        .register_default_analyzer::<EnglishAnalyzer>("english");
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn name(&self) -> &str {
        "standard"
    }

    fn text_analyzer(&self) -> TextAnalyzer {
        TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .build()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceAnalyzer;

impl Analyzer for WhitespaceAnalyzer {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn text_analyzer(&self) -> TextAnalyzer {
        TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .build()
    }
}

/// Whole value as a single token.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawAnalyzer;

impl Analyzer for RawAnalyzer {
    fn name(&self) -> &str {
        "raw"
    }

    fn text_analyzer(&self) -> TextAnalyzer {
        TextAnalyzer::from(RawTokenizer::default())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishAnalyzer;

impl Analyzer for EnglishAnalyzer {
    fn name(&self) -> &str {
        "english"
    }

    fn text_analyzer(&self) -> TextAnalyzer {
        TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build()
    }
}
