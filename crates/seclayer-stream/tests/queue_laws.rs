//! ByteQueue / ChangeNotifier の性質テスト

use proptest::prelude::*;

use seclayer_stream::{ByteQueue, ChangeNotifier, StreamEvent, StreamSnapshot};

proptest! {
    /// take_all() の間に積んだものが、順序どおり連結されて返る
    #[test]
    fn take_all_returns_concatenation(chunks in proptest::collection::vec(
        proptest::collection::vec(any::<u8>(), 0..64), 0..16)
    ) {
        let mut q = ByteQueue::new();
        let mut expected = Vec::new();
        for chunk in &chunks {
            q.append(chunk);
            expected.extend_from_slice(chunk);
        }

        prop_assert_eq!(q.take_all(), expected);
        prop_assert!(q.take_all().is_empty());
    }

    /// 1 サイクル内で何回バッファが増えてもイベントは種類ごとに 1 件
    #[test]
    fn one_event_per_kind_per_cycle(growths in proptest::collection::vec(1usize..32, 1..20)) {
        let mut n = ChangeNotifier::new();
        let mut readable = 0usize;
        let before = StreamSnapshot { readable, outgoing_readable: 0, closed: false, ok: true };
        n.begin(before);
        for g in &growths {
            readable += g;
        }
        n.end(StreamSnapshot { readable, outgoing_readable: readable, closed: false, ok: true });

        let events = n.take_events();
        prop_assert_eq!(events, vec![StreamEvent::ReadyRead, StreamEvent::ReadyReadOutgoing]);
    }
}
