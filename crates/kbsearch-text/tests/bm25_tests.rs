use kbsearch_core::types::Document;
use kbsearch_text::bm25::{Bm25Config, LexicalIndex};

fn doc(id: &str, content: &str) -> Document {
    Document::new(id, "", content)
}

fn index_of(docs: &[Document]) -> LexicalIndex {
    let mut index = LexicalIndex::new(Bm25Config::default()).expect("valid config");
    index.index_documents(docs);
    index
}

#[test]
fn rejects_invalid_parameters() {
    assert!(LexicalIndex::new(Bm25Config { k1: -1.0, b: 0.75 }).is_err());
    assert!(LexicalIndex::new(Bm25Config { k1: 1.5, b: 1.5 }).is_err());
    assert!(LexicalIndex::new(Bm25Config { k1: 0.0, b: 0.0 }).is_ok());
}

#[test]
fn empty_query_and_empty_index_return_nothing() {
    let index = index_of(&[doc("d1", "some text here")]);
    assert!(index.search("", 10, None).is_empty());
    let empty = index_of(&[]);
    assert!(empty.search("text", 10, None).is_empty());
}

#[test]
fn higher_term_frequency_scores_higher() {
    // Three "apple"s beat one "apple" plus one "banana".
    let index = index_of(&[
        doc("d1", "apple apple apple"),
        doc("d2", "apple banana"),
    ]);
    let results = index.search("apple", 10, None);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].document_id, "d1");
    assert!(results[0].score > results[1].score);
}

#[test]
fn score_is_monotone_in_term_frequency() {
    let mut index = LexicalIndex::new(Bm25Config::default()).expect("valid config");
    // Same length documents, increasing tf for "rust".
    index.index_documents(&[
        doc("d1", "rust filler filler filler"),
        doc("d2", "rust rust filler filler"),
        doc("d3", "rust rust rust filler"),
    ]);
    let results = index.search("rust", 10, None);
    assert_eq!(results[0].document_id, "d3");
    assert_eq!(results[1].document_id, "d2");
    assert_eq!(results[2].document_id, "d1");
}

#[test]
fn rare_terms_outweigh_common_ones() {
    // "common" appears everywhere, "unique" once; equal tf within each doc.
    let index = index_of(&[
        doc("d1", "common unique"),
        doc("d2", "common filler"),
        doc("d3", "common filler"),
    ]);
    let results = index.search("common unique", 10, None);
    assert_eq!(results[0].document_id, "d1");
    let r1 = &results[0];
    let bm25 = r1.component_scores.bm25.expect("bm25 component");
    assert!(bm25 > 0.0);
    assert!(r1.matched_terms.contains(&"unique".to_string()));
}

#[test]
fn incremental_add_and_remove_adjust_stats() {
    let mut index = index_of(&[doc("d1", "alpha beta"), doc("d2", "alpha gamma delta epsilon")]);
    assert_eq!(index.stats().total_documents, 2);
    assert_eq!(index.stats().document_frequency.get("alpha"), Some(&2));

    index.remove_document("d1");
    assert_eq!(index.stats().total_documents, 1);
    assert_eq!(index.stats().document_frequency.get("alpha"), Some(&1));
    assert!(index.stats().document_frequency.get("beta").is_none());

    // Removing an unknown id is a no-op.
    index.remove_document("nope");
    assert_eq!(index.stats().total_documents, 1);

    index.add_document(&doc("d3", "alpha"));
    assert_eq!(index.stats().total_documents, 2);
    let expected_avg = (4.0 + 1.0) / 2.0;
    assert!((index.stats().avg_doc_length - expected_avg).abs() < 1e-6);
}

#[test]
fn document_frequency_never_exceeds_total() {
    let mut index = index_of(&[
        doc("d1", "shared one"),
        doc("d2", "shared two"),
        doc("d3", "shared three"),
    ]);
    index.remove_document("d2");
    for (_, df) in index.stats().document_frequency.iter() {
        assert!(*df as usize <= index.stats().total_documents);
    }
}

#[test]
fn reindexing_replaces_prior_corpus() {
    let mut index = index_of(&[doc("old", "stale words")]);
    index.index_documents(&[doc("new", "fresh words")]);
    assert!(index.get("old").is_none());
    assert!(index.get("new").is_some());
    assert_eq!(index.stats().total_documents, 1);
}

#[test]
fn threshold_filters_low_scores() {
    let index = index_of(&[doc("d1", "apple apple apple"), doc("d2", "apple pear")]);
    let all = index.search("apple", 10, None);
    let floor = all[1].score;
    let filtered = index.search("apple", 10, Some(floor));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].document_id, "d1");
}

#[test]
fn cjk_query_matches_bigrams() {
    let index = index_of(&[
        doc("doc1", "人工智能是计算机科学的一个分支"),
        doc("doc2", "机器学习是人工智能的重要组成部分"),
    ]);
    let results = index.search("人工智能", 10, None);
    assert_eq!(results.len(), 2);
    for r in &results {
        assert!(r.score > 0.0);
        assert!(r.matched_terms.contains(&"人工".to_string()));
        assert!(r.matched_terms.contains(&"智能".to_string()));
    }
}

#[test]
fn ties_break_by_insertion_order() {
    let index = index_of(&[doc("first", "same text"), doc("second", "same text")]);
    let results = index.search("same text", 10, None);
    assert_eq!(results[0].document_id, "first");
    assert_eq!(results[1].document_id, "second");
}
