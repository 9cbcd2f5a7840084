//! # Reply Flattening
//!
//! Converts one raw reply into a [`Response`] and, when the policy queues,
//! pushes every leaf of the reply onto the response queue.
//!
//! Array wrappers are never queued; their leaves are, in left-to-right order.
//! If any element of an array fails, everything that array queued during its
//! traversal is removed again and the array's response is that failure.

use kvwrap_common::{ReplyValue, NIL};
use tracing::{debug, warn};

use crate::flags::Delivery;
use crate::queue::ResponseQueue;
use crate::response::{FailureKind, Response};

/// Flattens `reply` into `queue` under `delivery` and returns the command's
/// direct response.
///
/// A successful array reply returns an empty payload; its data lives in the
/// queue.
pub fn flatten_reply(reply: ReplyValue, delivery: Delivery, queue: &mut ResponseQueue) -> Response {
    match reply {
        ReplyValue::Error(message) => {
            warn!(error = %message, "server returned an error reply");
            Response::failure(FailureKind::Protocol, message)
        }
        ReplyValue::Status(text) | ReplyValue::BulkString(text) => leaf(text, delivery, queue),
        ReplyValue::Integer(value) => leaf(value.to_string(), delivery, queue),
        ReplyValue::Nil => leaf(NIL.to_string(), delivery, queue),
        ReplyValue::Array(items) => flatten_array(items, delivery, queue),
    }
}

fn leaf(payload: String, delivery: Delivery, queue: &mut ResponseQueue) -> Response {
    if delivery == Delivery::Queue {
        queue.push(payload.clone());
    }
    Response::success(payload)
}

fn flatten_array(items: Vec<ReplyValue>, delivery: Delivery, queue: &mut ResponseQueue) -> Response {
    let mark = queue.len();
    let total = items.len();
    for (index, item) in items.into_iter().enumerate() {
        let response = flatten_reply(item, delivery, queue);
        if !response.is_success() {
            let removed = queue.rollback_to(mark);
            debug!(index, total, removed, "array element failed; rolled back queued siblings");
            return response;
        }
    }
    Response::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(text: &str) -> ReplyValue {
        ReplyValue::BulkString(text.to_string())
    }

    fn drain(queue: &mut ResponseQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop(false)).collect()
    }

    #[test]
    fn scalar_replies() {
        let mut queue = ResponseQueue::new();
        let status = flatten_reply(ReplyValue::Status("OK".into()), Delivery::Queue, &mut queue);
        let integer = flatten_reply(ReplyValue::Integer(-12), Delivery::Queue, &mut queue);
        let nil = flatten_reply(ReplyValue::Nil, Delivery::Queue, &mut queue);
        let empty = flatten_reply(bulk(""), Delivery::Queue, &mut queue);

        assert_eq!(status.payload(), "OK");
        assert_eq!(integer.payload(), "-12");
        assert!(nil.is_nil());
        assert_eq!(empty.payload(), "");
        assert!(!empty.is_nil());
        assert_eq!(drain(&mut queue), vec!["OK", "-12", NIL, ""]);
    }

    #[test]
    fn error_reply_fails_and_is_not_queued() {
        let mut queue = ResponseQueue::new();
        let response = flatten_reply(ReplyValue::Error("ERR nope".into()), Delivery::Queue, &mut queue);
        assert_eq!(response.failure_kind(), Some(FailureKind::Protocol));
        assert_eq!(response.payload(), "ERR nope");
        assert!(queue.is_empty());
    }

    #[test]
    fn array_preserves_order_without_wrapper() {
        let mut queue = ResponseQueue::new();
        let reply = ReplyValue::Array(vec![bulk("A"), bulk("B"), bulk("C")]);
        let response = flatten_reply(reply, Delivery::Queue, &mut queue);
        assert!(response.is_success());
        assert_eq!(response.payload(), "");
        assert_eq!(drain(&mut queue), vec!["A", "B", "C"]);
    }

    #[test]
    fn nested_arrays_flatten_depth_first() {
        let mut queue = ResponseQueue::new();
        let reply = ReplyValue::Array(vec![
            bulk("A"),
            ReplyValue::Array(vec![ReplyValue::Integer(1), ReplyValue::Nil]),
            bulk("C"),
        ]);
        flatten_reply(reply, Delivery::Queue, &mut queue);
        assert_eq!(drain(&mut queue), vec!["A", "1", NIL, "C"]);
    }

    #[test]
    fn failed_element_rolls_back_only_this_array() {
        let mut queue = ResponseQueue::new();
        queue.push("earlier".to_string());
        let reply = ReplyValue::Array(vec![
            bulk("A"),
            ReplyValue::Error("ERR middle".into()),
            bulk("C"),
        ]);
        let response = flatten_reply(reply, Delivery::Queue, &mut queue);
        assert!(!response.is_success());
        assert_eq!(response.payload(), "ERR middle");
        assert_eq!(drain(&mut queue), vec!["earlier"]);
    }

    #[test]
    fn failure_inside_nested_array_rolls_back_outer_siblings() {
        let mut queue = ResponseQueue::new();
        let reply = ReplyValue::Array(vec![
            bulk("A"),
            ReplyValue::Array(vec![bulk("B"), ReplyValue::Error("ERR deep".into())]),
        ]);
        let response = flatten_reply(reply, Delivery::Queue, &mut queue);
        assert!(!response.is_success());
        assert!(queue.is_empty());
    }

    #[test]
    fn discard_never_queues() {
        let mut queue = ResponseQueue::new();
        let reply = ReplyValue::Array(vec![bulk("A"), bulk("B")]);
        assert!(flatten_reply(reply, Delivery::Discard, &mut queue).is_success());
        let single = flatten_reply(bulk("x"), Delivery::Discard, &mut queue);
        assert_eq!(single.payload(), "x");
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_array_succeeds_with_nothing_queued() {
        let mut queue = ResponseQueue::new();
        let response = flatten_reply(ReplyValue::Array(Vec::new()), Delivery::Queue, &mut queue);
        assert!(response.is_success());
        assert!(queue.is_empty());
    }
}
