//! Property tests for the wire codecs.

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use certchain_ledger::{Block, Transaction};

prop_compose! {
    fn arb_datetime()(secs in 0i64..4_000_000_000i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }
}

prop_compose! {
    fn arb_transaction()(
        public_key in "[ -~]{1,120}",
        name in "\\PC{1,40}",
        surname in "\\PC{1,40}",
        inquiry in "[a-z0-9-]{1,40}",
        datetime in arb_datetime(),
        signature in "[A-Za-z0-9+/]{4,88}",
    ) -> Transaction {
        Transaction::new(public_key, name, surname, inquiry, datetime, signature)
    }
}

proptest! {
    #[test]
    fn transaction_wire_roundtrip(tx in arb_transaction()) {
        let back = Transaction::deserialize(&tx.serialize()).unwrap();
        prop_assert_eq!(back, tx);
    }

    #[test]
    fn transaction_id_is_a_function_of_canonical_fields(tx in arb_transaction()) {
        let mut other = tx.clone();
        other.signature = "QUJD".to_string();
        other.id = other.compute_id();
        // same canonical fields, different signature: same id
        prop_assert_eq!(&other.id, &tx.id);
    }

    #[test]
    fn block_wire_roundtrip(
        txs in prop::collection::vec(arb_transaction(), 1..6),
        prev in "[0-9a-f]{64}",
        height in 1u64..1_000_000,
        datetime in arb_datetime(),
        bits in 0u32..16,
        nonce in any::<u32>(),
    ) {
        let mut block = Block::with_timestamp(txs, prev, height, datetime);
        block.header.bits = bits;
        block.header.nonce = nonce;
        let back = Block::from_wire_bytes(&block.to_wire_bytes()).unwrap();
        prop_assert_eq!(back.hash(), block.hash());
        prop_assert_eq!(back, block);
    }

    #[test]
    fn block_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Block::from_wire_bytes(&bytes);
    }
}
