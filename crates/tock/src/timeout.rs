// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

use crate::{Error, Sleep};

pin_project! {
    /// A future that races an inner future against a virtual deadline.
    ///
    /// - If the inner future completes first, its output is returned.
    /// - If the clock reaches the deadline first, a timeout error is returned.
    ///
    /// Created by [`FutureExt::timeout`][crate::FutureExt::timeout].
    #[derive(Debug)]
    #[must_use = "futures do nothing unless polled"]
    pub struct Timeout<F> {
        #[pin]
        future: F,
        deadline: Sleep,
    }
}

impl<F> Timeout<F> {
    pub(crate) const fn new(future: F, deadline: Sleep) -> Self {
        Self { future, deadline }
    }

    /// Consumes the `Timeout` and returns the inner future.
    #[must_use]
    pub fn into_inner(self) -> F {
        self.future
    }
}

impl<F: Future> Future for Timeout<F> {
    type Output = Result<F::Output, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.future.poll(cx) {
            Poll::Ready(v) => Poll::Ready(Ok(v)),
            Poll::Pending => match Pin::new(this.deadline).poll(cx) {
                Poll::Ready(()) => Poll::Ready(Err(Error::timed_out())),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
