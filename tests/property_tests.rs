//! Property-based tests over the state machine, the record codec, and the
//! log buffer.
//!
//! Proptest verifies the invariants that unit tests only spot-check:
//! terminal exclusivity for arbitrary status pairs, codec round-trip
//! stability for arbitrary records, append-order preservation for
//! arbitrary byte chunks, and panic-freedom of record deserialization
//! against arbitrary JSON.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use publisher_tasks::{LogBuffer, TaskRecord, TaskStatus};

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(vec![
        TaskStatus::Queued,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Canceled,
    ])
}

fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    // 1970..2100, with sub-second precision.
    (0i64..4_102_444_800, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| Utc.timestamp_opt(secs, nanos).unwrap())
}

fn arb_record() -> impl Strategy<Value = TaskRecord> {
    (
        "[a-f0-9]{8}-[a-f0-9]{4}-4[a-f0-9]{3}-[89ab][a-f0-9]{3}-[a-f0-9]{12}",
        arb_status(),
        arb_timestamp(),
        arb_timestamp(),
        ".{0,100}",
    )
        .prop_map(|(uuid, status, created, modified, reason)| TaskRecord {
            uuid,
            status,
            created,
            modified,
            reason,
        })
}

proptest! {
    // ---- State machine ----

    #[test]
    fn terminal_statuses_admit_no_transition(from in arb_status(), to in arb_status()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn self_transitions_are_rejected(status in arb_status()) {
        prop_assert!(!status.can_transition_to(status));
    }

    #[test]
    fn nothing_transitions_back_to_queued(from in arb_status(), to in arb_status()) {
        if to == TaskStatus::Queued {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn status_serde_round_trip(status in arb_status()) {
        let json = serde_json::to_value(status).unwrap();
        let back: TaskStatus = serde_json::from_value(json).unwrap();
        prop_assert_eq!(status, back);
    }

    // ---- Record codec ----

    #[test]
    fn record_serde_round_trip(record in arb_record()) {
        let bytes = serde_json::to_vec(&record).unwrap();
        let back: TaskRecord = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(back, record);
    }

    #[test]
    fn record_deserialization_never_panics(json in "\\PC*") {
        // Arbitrary junk either parses or errors; it must not panic.
        let _ = serde_json::from_str::<TaskRecord>(&json);
    }

    #[test]
    fn record_deserialization_tolerates_extra_fields(
        record in arb_record(),
        extra in "x_[a-z_]{1,18}",
    ) {
        let mut value = serde_json::to_value(&record).unwrap();
        value[extra.as_str()] = serde_json::json!("surplus");
        let back: TaskRecord = serde_json::from_value(value).unwrap();
        prop_assert_eq!(back.uuid, record.uuid);
        prop_assert_eq!(back.status, record.status);
    }

    // ---- Log buffer ----

    #[test]
    fn log_buffer_snapshot_equals_appended_sequence(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32),
    ) {
        let buffer = LogBuffer::new();
        let mut expected = Vec::new();
        for chunk in &chunks {
            buffer.append(chunk);
            expected.extend_from_slice(chunk);
        }
        prop_assert_eq!(buffer.snapshot(), expected);
    }

    #[test]
    fn log_buffer_len_tracks_appends(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32),
    ) {
        let buffer = LogBuffer::new();
        let mut total = 0;
        for chunk in &chunks {
            buffer.append(chunk);
            total += chunk.len();
        }
        prop_assert_eq!(buffer.len(), total);
        prop_assert_eq!(buffer.is_empty(), total == 0);
    }
}
