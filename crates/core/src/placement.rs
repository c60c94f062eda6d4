//! One-shot signature placement.

use crate::annotation::SignatureKind;

/// A signature waiting for the next click.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSignature {
    pub image: Vec<u8>,
    pub width: f32,
    pub height: f32,
    pub kind: SignatureKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PlacementState {
    #[default]
    Idle,
    Armed(PendingSignature),
}

impl PlacementState {
    /// Replaces whatever was armed before.
    pub fn arm(&mut self, pending: PendingSignature) {
        *self = Self::Armed(pending);
    }

    /// Consumes the armed payload, leaving the slot idle.
    pub fn take(&mut self) -> Option<PendingSignature> {
        match std::mem::take(self) {
            Self::Armed(pending) => Some(pending),
            Self::Idle => None,
        }
    }

    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed(_))
    }
}
