//! The verify/settle interface of an x402 facilitator.
//!
//! [`Facilitator::verify`] checks a payment against its requirements without
//! moving funds; [`Facilitator::settle`] executes it.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::proto;

/// Asynchronous interface of an x402 payment facilitator.
pub trait Facilitator {
    /// The error type returned by this facilitator.
    type Error: Debug + Display;

    /// Verifies a payment without settling it.
    ///
    /// A payment the facilitator rejects is an `Ok` response with
    /// `is_valid == false`, not an error.
    fn verify(
        &self,
        request: &proto::VerifyRequest,
    ) -> impl Future<Output = Result<proto::VerifyResponse, Self::Error>> + Send;

    /// Settles a payment.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the facilitator could not be reached or
    /// refused the settlement.
    fn settle(
        &self,
        request: &proto::SettleRequest,
    ) -> impl Future<Output = Result<proto::SettleResponse, Self::Error>> + Send;

    /// Lists the payment kinds the facilitator accepts.
    fn supported(
        &self,
    ) -> impl Future<Output = Result<proto::SupportedResponse, Self::Error>> + Send;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &proto::VerifyRequest,
    ) -> impl Future<Output = Result<proto::VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &proto::SettleRequest,
    ) -> impl Future<Output = Result<proto::SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }

    fn supported(
        &self,
    ) -> impl Future<Output = Result<proto::SupportedResponse, Self::Error>> + Send {
        self.as_ref().supported()
    }
}
