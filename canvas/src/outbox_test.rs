use super::*;
use crate::element::{Label, Rgb};

fn label(text: &str) -> Element {
    Element::Label(Label { text: text.into(), x: 0.0, y: 0.0, font_size: 20.0, color: Rgb::BLACK })
}

#[test]
fn enqueue_assigns_ids_and_nonces() {
    let mut outbox = Outbox::new();
    let a = outbox.enqueue(label("a")).clone();
    let b = outbox.enqueue(label("b")).clone();
    assert_ne!(a.id, b.id);
    assert_ne!(a.nonce, b.nonce);
    assert_eq!(a.state, CommitState::Pending);
    assert_eq!(outbox.len(), 2);
}

#[test]
fn record_carries_nonce() {
    let mut outbox = Outbox::new();
    let commit = outbox.enqueue(label("hi")).clone();
    let record = commit.record();
    assert_eq!(element::nonce_of(&record), Some(commit.nonce.as_str()));
    assert_eq!(record["type"], "text");
}

#[test]
fn acknowledged_commit_settles_on_next_snapshot() {
    let mut outbox = Outbox::new();
    let id = outbox.enqueue(label("a")).id;
    assert!(outbox.acknowledge(id, ArrivalToken(1)));
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox.settle(|_| false), 1);
    assert!(outbox.is_empty());
}

#[test]
fn snapshot_nonce_settles_pending_commit() {
    let mut outbox = Outbox::new();
    let nonce = outbox.enqueue(label("a")).nonce.clone();
    outbox.enqueue(label("b"));
    assert_eq!(outbox.settle(|n| n == nonce), 1);
    assert_eq!(outbox.len(), 1);
}

#[test]
fn ack_after_settle_is_reported() {
    let mut outbox = Outbox::new();
    let commit = outbox.enqueue(label("a")).clone();
    outbox.settle(|n| n == commit.nonce);
    assert!(!outbox.acknowledge(commit.id, ArrivalToken(3)));
}

#[test]
fn failed_commit_can_be_retried_with_same_nonce() {
    let mut outbox = Outbox::new();
    let commit = outbox.enqueue(label("a")).clone();
    assert!(outbox.mark_failed(commit.id, "timeout"));
    assert_eq!(outbox.failed().count(), 1);

    let record = outbox.retry(commit.id).unwrap();
    assert_eq!(element::nonce_of(&record), Some(commit.nonce.as_str()));
    assert_eq!(outbox.get(commit.id).map(|c| c.state.clone()), Some(CommitState::Pending));
}

#[test]
fn retry_requires_failed_state() {
    let mut outbox = Outbox::new();
    let id = outbox.enqueue(label("a")).id;
    assert_eq!(outbox.retry(id), None);
}

#[test]
fn discard_removes_only_failed() {
    let mut outbox = Outbox::new();
    let id = outbox.enqueue(label("a")).id;
    assert!(outbox.discard(id).is_none());
    outbox.mark_failed(id, "boom");
    assert!(outbox.discard(id).is_some());
    assert!(outbox.is_empty());
}

#[test]
fn acknowledged_commit_cannot_fail() {
    let mut outbox = Outbox::new();
    let id = outbox.enqueue(label("a")).id;
    outbox.acknowledge(id, ArrivalToken(1));
    assert!(!outbox.mark_failed(id, "late timeout"));
}

#[test]
fn commit_id_display() {
    let mut outbox = Outbox::new();
    let id = outbox.enqueue(label("a")).id;
    assert_eq!(id.to_string(), "c1");
}
