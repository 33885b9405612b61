//! `Dupe`: a cheap `Clone`.
//
// SPDX-License-Identifier: Apache-2.0 OR GPL-3.0-or-later

use bytes::Bytes;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Cloning that is known to be cheap: bumping a refcount or copying a
/// handful of words, never a deep copy. Spelling it `dupe` at the call
/// site keeps the expensive `clone`s visible.
pub trait Dupe {
    /// A cheap clone of the object.
    #[must_use]
    fn dupe(&self) -> Self;
}

impl<T: ?Sized> Dupe for Arc<T> {
    #[inline]
    fn dupe(&self) -> Self {
        Self::clone(self)
    }
}

impl<T: ?Sized> Dupe for Weak<T> {
    #[inline]
    fn dupe(&self) -> Self {
        Self::clone(self)
    }
}

impl Dupe for Bytes {
    #[inline]
    fn dupe(&self) -> Self {
        self.clone()
    }
}

impl<T> Dupe for mpsc::Sender<T> {
    #[inline]
    fn dupe(&self) -> Self {
        self.clone()
    }
}

impl<T> Dupe for mpsc::UnboundedSender<T> {
    #[inline]
    fn dupe(&self) -> Self {
        self.clone()
    }
}
