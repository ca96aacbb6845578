use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "policy_text";

#[derive(Clone, Copy)]
pub struct PolicyFields {
	pub id: Field,
	pub ordinal: Field,
	pub text: Field,
}

pub fn build_schema() -> (Schema, PolicyFields) {
	let mut schema_builder = Schema::builder();
	let id = schema_builder.add_text_field("id", STRING | STORED);
	let ordinal = schema_builder.add_u64_field("ordinal", STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let text = schema_builder.add_text_field("text", text_options);
	(schema_builder.build(), PolicyFields { id, ordinal, text })
}

pub fn fields_of(schema: &Schema) -> tantivy::Result<PolicyFields> {
	Ok(PolicyFields { id: schema.get_field("id")?, ordinal: schema.get_field("ordinal")?, text: schema.get_field("text")? })
}

/// Word tokens, lowercased, with English function words removed.
///
/// Must be registered on every `Index` handle, both when building and when
/// reopening, or queries silently tokenize differently from the index.
pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}
