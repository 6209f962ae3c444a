use proptest::collection::vec;
use proptest::prelude::*;
use tidewatch_common::notify::format_batches;

const HEADER: &str = "<@&987654321>";

fn numeric_id() -> impl Strategy<Value = String> {
    "[1-9][0-9]{0,18}"
}

fn split_items(batches: &[String], header: Option<&str>) -> Vec<String> {
    batches
        .iter()
        .enumerate()
        .flat_map(|(index, text)| {
            let body = match header {
                Some(header) if index == 0 => text
                    .strip_prefix(header)
                    .and_then(|rest| rest.strip_prefix('\n'))
                    .expect("first batch should start with header line"),
                _ => text.as_str(),
            };
            body.lines().map(str::to_string).collect::<Vec<_>>()
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn concatenated_batches_reproduce_input(
        items in vec(numeric_id(), 0..60),
        chunk_size in 1usize..15,
        with_header in any::<bool>(),
    ) {
        let header = with_header.then_some(HEADER);
        let batches = format_batches(&items, chunk_size, header).unwrap();

        prop_assert_eq!(batches.len(), items.len().div_ceil(chunk_size));
        prop_assert_eq!(split_items(&batches, header), items);
    }

    #[test]
    fn header_appears_only_in_first_batch(
        items in vec(numeric_id(), 1..60),
        chunk_size in 1usize..15,
    ) {
        let batches = format_batches(&items, chunk_size, Some(HEADER)).unwrap();

        prop_assert!(batches[0].starts_with(HEADER));
        for batch in batches.iter().skip(1) {
            prop_assert!(!batch.contains(HEADER));
        }
    }

    #[test]
    fn every_batch_respects_chunk_size(
        items in vec(numeric_id(), 0..60),
        chunk_size in 1usize..15,
    ) {
        let batches = format_batches(&items, chunk_size, None).unwrap();
        for batch in &batches {
            prop_assert!(batch.lines().count() <= chunk_size);
        }
    }
}

#[test]
fn twenty_five_ids_in_chunks_of_ten() {
    let items: Vec<String> = (100..125).map(|n| n.to_string()).collect();
    let batches = format_batches(&items, 10, Some("X")).unwrap();

    let sizes: Vec<usize> = batches
        .iter()
        .enumerate()
        .map(|(index, batch)| batch.lines().count() - usize::from(index == 0))
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(split_items(&batches, Some("X")), items);
}

#[test]
fn empty_ids_emit_nothing() {
    let items: Vec<String> = Vec::new();
    assert!(format_batches(&items, 10, Some("X")).expect("chunk size is valid").is_empty());
}
