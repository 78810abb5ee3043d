//! Confirmation boundary: an external reasoning service that confirms or
//! rejects a threshold-crossing score.

use crate::domain::decision::{ConfirmationRequest, Verdict};
use crate::domain::error::TurbotraderError;

pub trait ConfirmationPort {
    fn confirm(&self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError>;
}

impl<T: ConfirmationPort + ?Sized> ConfirmationPort for &T {
    fn confirm(&self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        (**self).confirm(request)
    }
}

impl<T: ConfirmationPort + ?Sized> ConfirmationPort for Box<T> {
    fn confirm(&self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        (**self).confirm(request)
    }
}

impl<T: ConfirmationPort + ?Sized> ConfirmationPort for std::sync::Arc<T> {
    fn confirm(&self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        (**self).confirm(request)
    }
}
