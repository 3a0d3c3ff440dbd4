//! Transaction contract.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::BytesMut;

use crate::error::ClientError;

/// One request/response exchange carried over a pooled connection.
///
/// Return values of [`request`](Transaction::request) and
/// [`response`](Transaction::response) follow one convention: negative is a
/// fatal error, zero means done, positive means more is needed.
pub trait Transaction {
    /// Append request bytes to `output`. `input` holds whatever response bytes
    /// already arrived.
    fn request(&mut self, output: &mut BytesMut, input: &BytesMut) -> i32;

    /// Consume response bytes from `input`. A positive return is the number of
    /// additional bytes needed before the next call.
    fn response(&mut self, input: &mut BytesMut) -> i32;

    /// The exchange failed. Called at most once per submission.
    fn error(&mut self, error: ClientError);
}

/// Shared handle to a caller-owned transaction. The pool keeps a clone only
/// while a connection is working on it.
pub type TransactionRef = Rc<RefCell<dyn Transaction>>;
